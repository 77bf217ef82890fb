//! pymigrate binary entry point.

use clap::Parser;

use pymigrate::cli::{build_context, run, Cli, Commands};
use pymigrate::observability::init_logging;

fn main() {
    init_logging();
    let cli = Cli::parse();
    let code = match cli.cmd {
        Commands::Serve => serve(&cli),
        _ => run(&cli),
    };
    std::process::exit(code);
}

fn serve(cli: &Cli) -> i32 {
    let ctx = match build_context(cli) {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!(error = %err, "cannot load configuration");
            return 2;
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(error = %err, "cannot start async runtime");
            return 1;
        }
    };
    match runtime.block_on(pymigrate::mcp::server::run_server(ctx)) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "MCP server stopped");
            1
        }
    }
}
