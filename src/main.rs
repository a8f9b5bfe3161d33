use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use wikirefs::{
    bot::{BotConfig, CopyRefsBot},
    catalog::{self, SAMPLE_CATALOG},
    config::{self, PASSWORD_VAR, USERNAME_VAR},
    dedup::DuplicateReferences,
    mediawiki::MediaWikiClient,
    options::{self, HELP, MISSING_GENERATOR},
    prompt::Terminal,
    reflist::NoReferences,
};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct CommandLine {
    /// Config file [default: ./wikirefs.toml]
    #[arg(long)]
    config: Option<PathBuf>,
    /// More log output, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Print the ISBN to title mapping of a book catalog
    Isbn {
        /// Catalog to read, the built-in sample if omitted
        file: Option<PathBuf>,
        /// Use the XML reader instead of the regular expression
        #[arg(long)]
        xml: bool,
        /// Custom regular expression, group 1 is the key and group 2 the value
        #[arg(long, conflicts_with = "xml")]
        pattern: Option<String>,
    },
    /// Copy references from the source language article into the placeholders of the target article
    #[command(disable_help_flag = true)]
    CopyRefs {
        /// Bot arguments, see `copy-refs -help`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_isbn(file: Option<PathBuf>, xml: bool, pattern: Option<String>) -> anyhow::Result<bool> {
    let text = match &file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?,
        None => SAMPLE_CATALOG.to_string(),
    };

    let catalog = match pattern {
        _ if xml => catalog::extract_xml(&text)?,
        Some(pattern) => catalog::extract_pairs(&text, &catalog::compile_pattern(&pattern)?),
        None => catalog::extract(&text),
    };
    print!("{}", catalog);
    Ok(true)
}

fn run_copy_refs(config_path: Option<PathBuf>, args: Vec<String>) -> anyhow::Result<bool> {
    let config_path = config::config_path(config_path.as_deref());
    let config = config::load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let mut terminal = Terminal;
    let command_line = options::parse_args(&args, &config.target_site(), &mut terminal)?;
    if command_line.global.help {
        print!("{}", HELP);
        return Ok(true);
    }

    let credentials = config::credentials_from_env();
    if credentials.is_none() && !command_line.global.simulate {
        tracing::warn!(
            "{} / {} not set, edits will be made anonymously",
            USERNAME_VAR,
            PASSWORD_VAR
        );
    }
    let client = MediaWikiClient::new(config.client_options(credentials))
        .context("failed to create HTTP client")?;

    let bot_config = BotConfig::from_options(&config, &command_line.global, &command_line.bot)
        .context("invalid -lang / -family override")?;
    let Some(pages) = command_line.generator.combined(&client) else {
        eprintln!("{}", MISSING_GENERATOR);
        return Ok(false);
    };

    let reference_list = NoReferences::new(config.reference_list_style())
        .context("invalid [reference_list] configuration")?;
    let mut bot = CopyRefsBot::new(
        &client,
        bot_config,
        Box::new(DuplicateReferences::new(config.autogenerated_name())),
        Box::new(reference_list),
        &mut terminal,
    );
    bot.run(pages)?;
    Ok(true)
}

fn main() -> ExitCode {
    let args = CommandLine::parse();
    init_logging(args.verbose, args.quiet);

    let result = match args.command {
        Command::Isbn { file, xml, pattern } => run_isbn(file, xml, pattern),
        Command::CopyRefs { args: bot_args } => run_copy_refs(args.config, bot_args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
