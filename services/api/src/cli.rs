use crate::demo::{run_demo, run_report_generate, DemoArgs, ReportGenerateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tenant_insights::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tenant Insights",
    about = "Serve and generate weekly business-insights reports for field-service tenants",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Generate weekly reports from activity exports
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
    /// Generate three weeks of reports from synthetic activity and browse them
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Generate the weekly report for one tenant and print it
    Generate(ReportGenerateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report {
            command: ReportCommand::Generate(args),
        } => run_report_generate(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["tenant-insights-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn report_generate_parses_week_start() {
        let cli = Cli::try_parse_from([
            "tenant-insights-api",
            "report",
            "generate",
            "--tenant",
            "northwind-plumbing",
            "--activity-dir",
            "fixtures/activity",
            "--week-start",
            "2025-09-22",
            "--json",
        ])
        .expect("parses");

        let Some(Command::Report {
            command: ReportCommand::Generate(args),
        }) = cli.command
        else {
            panic!("expected report generate");
        };
        assert_eq!(args.tenant, "northwind-plumbing");
        assert_eq!(args.week_start.map(|date| date.to_string()).as_deref(), Some("2025-09-22"));
        assert!(args.json);
    }

    #[test]
    fn report_generate_rejects_malformed_dates() {
        let result = Cli::try_parse_from([
            "tenant-insights-api",
            "report",
            "generate",
            "--tenant",
            "acme",
            "--activity-dir",
            ".",
            "--today",
            "22/09/2025",
        ]);
        assert!(result.is_err());
    }
}
