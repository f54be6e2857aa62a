use super::*;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["prospect-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["prospect-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["prospect-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn run_evaluate_defaults_to_configured_batch() {
    let cli = Cli::try_parse_from(["prospect-cli", "run", "evaluate"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            command: RunCommands::Evaluate { limit: None }
        })
    ));
}

#[test]
fn run_evaluate_with_limit_override() {
    let cli = Cli::try_parse_from(["prospect-cli", "run", "evaluate", "--limit", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            command: RunCommands::Evaluate { limit: Some(5) }
        })
    ));
}

#[test]
fn run_keywords_with_limit_override() {
    let cli = Cli::try_parse_from(["prospect-cli", "run", "keywords", "--limit", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            command: RunCommands::Keywords { limit: Some(3) }
        })
    ));
}

#[test]
fn rejects_negative_run_limit() {
    assert!(Cli::try_parse_from(["prospect-cli", "run", "derive", "--limit", "-2"]).is_err());
}

#[test]
fn parses_status_command() {
    let cli = Cli::try_parse_from(["prospect-cli", "status"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Status)));
}

#[test]
fn top_defaults_to_ten_evaluated_rows() {
    let cli = Cli::try_parse_from(["prospect-cli", "top"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Top {
            limit: 10,
            ref status
        }) if status == "evaluated"
    ));
}

#[test]
fn top_with_status_filter_and_limit() {
    let cli = Cli::try_parse_from([
        "prospect-cli",
        "top",
        "--status",
        "approved",
        "--limit",
        "3",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Top {
            limit: 3,
            ref status
        }) if status == "approved"
    ));
}
