use clap::{Parser, Subcommand, ValueEnum};

/// Relay gateway — reach the dashboard backend through CORS relays
#[derive(Parser)]
#[command(name = "relay-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the local bridge server
    Serve {
        /// Port to bind (defaults to RELAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one request and print the envelope
    Call {
        /// Backend resource, e.g. students
        resource: String,
        /// Backend action, e.g. list
        action: String,
        /// JSON body; a non-empty object makes the request a POST
        #[arg(long)]
        body: Option<String>,
        /// Extra query parameter as key=value (repeatable)
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
        /// Force the HTTP method instead of inferring it from the body
        #[arg(long, value_enum)]
        method: Option<HttpMethod>,
    },

    /// List the relay proxies in priority order
    Proxies,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if k.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((k.to_string(), v.to_string()))
}
