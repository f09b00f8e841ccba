use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dasm_lsp::{server::Backend, ServerConfig};
use tower_lsp::{LspService, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let config = build_config(&args);

    let (service, socket) =
        LspService::build(|client| Backend::new_with_config(client, config.clone()))
            .custom_method("dasm/entryFiles", Backend::entry_files)
            .finish();
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[derive(Parser, Debug)]
#[command(name = "dasm-lsp")]
struct Args {
    /// The dasm executable to assemble with (defaults to `dasm` on the PATH)
    #[arg(long)]
    dasm_path: Option<PathBuf>,

    /// Milliseconds to wait for edits to settle before reassembling
    #[arg(long)]
    debounce_ms: Option<u64>,
}

fn build_config(args: &Args) -> ServerConfig {
    let mut builder = ServerConfig::builder();
    if let Some(path) = &args.dasm_path {
        builder = builder.dasm_path(path.clone());
    }
    if let Some(ms) = args.debounce_ms {
        builder = builder.debounce(Duration::from_millis(ms));
    }
    builder.build()
}
