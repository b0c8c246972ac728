use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use clap::Parser;

use crate::fs::DEFAULT_CHUNK_SIZE;
use crate::http::ZipResponse;

#[derive(Parser, Debug)]
#[command(name = "zipresponse")]
#[command(version)]
#[command(about = "Serve a directory as a ZIP archive streamed over HTTP", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipresponse ./public                  serve ./public as a ZIP at http://127.0.0.1:8080/\n  \
  zipresponse -b 0.0.0.0:9000 -r /backup.zip /srv/data\n  \
  zipresponse -H 'Content-Disposition: attachment; filename=\"site.zip\"' ./site")]
pub struct Cli {
    /// Directory to archive
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Address to listen on
    #[arg(short = 'b', long, value_name = "ADDR", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Route serving the archive
    #[arg(short = 'r', long, value_name = "PATH", default_value = "/", value_parser = parse_route)]
    pub route: String,

    /// Maximum bytes read from a file at a time
    #[arg(short = 'c', long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: NonZeroUsize,

    /// Response status code
    #[arg(short = 's', long, value_name = "CODE", default_value = "200")]
    pub status: StatusCode,

    /// Response reason phrase (default: standard phrase for the status)
    #[arg(long, value_name = "TEXT")]
    pub reason: Option<String>,

    /// Extra response header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl Cli {
    /// Build the response served for each request.
    pub fn zip_response(&self) -> ZipResponse {
        let mut response = ZipResponse::new(&self.dir)
            .chunk_size(self.chunk_size)
            .status(self.status);
        if let Some(reason) = &self.reason {
            response = response.reason(reason);
        }
        for (name, value) in &self.headers {
            response = response.header(name.clone(), value.clone());
        }
        response
    }
}

fn parse_route(raw: &str) -> Result<String, String> {
    if !raw.starts_with('/') {
        return Err(format!("route must start with '/', got {raw:?}"));
    }
    Ok(raw.to_string())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME: VALUE, got {raw:?}"))?;
    let name = HeaderName::try_from(name.trim()).map_err(|e| e.to_string())?;
    let value = HeaderValue::try_from(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}
