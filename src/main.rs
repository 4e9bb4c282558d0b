use clap::{Arg, ArgAction, Command};
use std::process::ExitCode;

use confsync::config::Config;
use confsync::logging::{self, error, info};
use confsync::store::DocStore;
use confsync::sync::Syncer;

fn cli() -> Command {
	Command::new("confsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Push markdown files/directories to Confluence")
		.subcommand_required(true)
		.arg(
			Arg::new("debug")
				.short('d')
				.long("debug")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Enable debug logging"),
		)
		.subcommand(
			Command::new("sync")
				.about("Sync markdown trees into a space")
				.arg(
					Arg::new("space")
						.short('s')
						.long("space")
						.value_name("KEY")
						.help("Space key that receives the documents"),
				)
				.arg(
					Arg::new("endpoint")
						.short('e')
						.long("endpoint")
						.value_name("URL")
						.help("Remote endpoint, e.g. https://company.atlassian.net/wiki"),
				)
				.arg(
					Arg::new("username")
						.short('u')
						.long("username")
						.value_name("USER")
						.help("Username for basic auth"),
				)
				.arg(
					Arg::new("password")
						.short('p')
						.long("password")
						.value_name("PASS")
						.help("Password or API token for basic auth"),
				)
				.arg(
					Arg::new("access-token")
						.long("access-token")
						.value_name("TOKEN")
						.help("Bearer token (overrides username/password)"),
				)
				.arg(
					Arg::new("parent")
						.long("parent")
						.value_name("ID")
						.help("Remote ID of an existing page to nest everything under"),
				)
				.arg(
					Arg::new("title")
						.short('t')
						.long("title")
						.value_name("TITLE")
						.help("Title override (single file only)"),
				)
				.arg(
					Arg::new("use-document-title")
						.long("use-document-title")
						.action(ArgAction::SetTrue)
						.help("Use the first level-1 heading as the title"),
				)
				.arg(
					Arg::new("hardwraps")
						.short('w')
						.long("hardwraps")
						.action(ArgAction::SetTrue)
						.help("Render newlines as hard line breaks"),
				)
				.arg(
					Arg::new("force")
						.short('f')
						.long("force")
						.action(ArgAction::SetTrue)
						.help("Upload even when content is unchanged"),
				)
				.arg(
					Arg::new("exclude")
						.short('x')
						.long("exclude")
						.value_name("REGEX")
						.action(ArgAction::Append)
						.help("Exclude paths matching the regular expression"),
				)
				.arg(
					Arg::new("since")
						.long("since")
						.value_name("MINUTES")
						.value_parser(clap::value_parser!(u64))
						.help("Only include files modified within the last N minutes"),
				)
				.arg(
					Arg::new("local-store")
						.short('l')
						.long("local-store")
						.value_name("FILE")
						.help("Path of the local state database"),
				)
				.arg(
					Arg::new("parallelism")
						.long("parallelism")
						.value_name("N")
						.value_parser(clap::value_parser!(usize))
						.help("Number of concurrent upload workers"),
				)
				.arg(
					Arg::new("dry-run")
						.long("dry-run")
						.action(ArgAction::SetTrue)
						.help("Print the plan without touching the remote"),
				)
				.arg(
					Arg::new("root")
						.value_name("DIR|FILE")
						.required(true)
						.action(ArgAction::Append)
						.num_args(1..)
						.help("Markdown files or directories to sync"),
				),
		)
		.subcommand(
			Command::new("state")
				.about("Dump the local state database")
				.arg(
					Arg::new("local-store")
						.short('l')
						.long("local-store")
						.value_name("FILE")
						.help("Path of the local state database"),
				),
		)
}

fn apply_flags(config: &mut Config, matches: &clap::ArgMatches) {
	if let Some(s) = matches.get_one::<String>("space") {
		config.space = s.clone();
	}
	if let Some(s) = matches.get_one::<String>("endpoint") {
		config.endpoint = s.clone();
	}
	if let Some(s) = matches.get_one::<String>("username") {
		config.username = s.clone();
	}
	if let Some(s) = matches.get_one::<String>("password") {
		config.password = s.clone();
	}
	if let Some(s) = matches.get_one::<String>("access-token") {
		config.access_token = s.clone();
	}
	if let Some(s) = matches.get_one::<String>("parent") {
		config.parent = s.clone();
	}
	if let Some(s) = matches.get_one::<String>("title") {
		config.title = s.clone();
	}
	if matches.get_flag("use-document-title") {
		config.use_document_title = true;
	}
	if matches.get_flag("hardwraps") {
		config.hard_wraps = true;
	}
	if matches.get_flag("force") {
		config.force = true;
	}
	if let Some(patterns) = matches.get_many::<String>("exclude") {
		config.exclude_patterns.extend(patterns.cloned());
	}
	if let Some(minutes) = matches.get_one::<u64>("since") {
		config.since_minutes = *minutes;
	}
	if let Some(path) = matches.get_one::<String>("local-store") {
		config.local_store = path.into();
	}
	if let Some(n) = matches.get_one::<usize>("parallelism") {
		config.parallelism = *n;
	}
	if matches.get_flag("dry-run") {
		config.dry_run = true;
	}
	config.roots = matches
		.get_many::<String>("root")
		.map(|roots| roots.cloned().collect())
		.unwrap_or_default();
}

async fn run_sync(matches: &clap::ArgMatches) -> ExitCode {
	let mut config = Config::load();
	apply_flags(&mut config, matches);
	if let Err(err) = config.validate() {
		error!("{}", err);
		return ExitCode::FAILURE;
	}
	let dry_run = config.dry_run;

	let syncer = match Syncer::new(config) {
		Ok(syncer) => syncer,
		Err(err) => {
			error!("{}", err);
			return ExitCode::FAILURE;
		}
	};

	let plan = match syncer.prepare().await {
		Ok(plan) => plan,
		Err(err) => {
			error!("{}", err);
			return ExitCode::FAILURE;
		}
	};
	println!("{}", plan);
	if plan.is_empty() {
		return ExitCode::SUCCESS;
	}
	if dry_run {
		info!("dry run, nothing uploaded");
		return ExitCode::SUCCESS;
	}

	match syncer.sync().await {
		Ok(report) => {
			println!(
				"{} synced, {} deleted, {} failed",
				report.synced,
				report.deleted,
				report.failures.len()
			);
			if report.is_clean() {
				ExitCode::SUCCESS
			} else {
				ExitCode::FAILURE
			}
		}
		Err(err) => {
			error!("{}", err);
			ExitCode::FAILURE
		}
	}
}

fn run_state(matches: &clap::ArgMatches) -> ExitCode {
	let path = matches
		.get_one::<String>("local-store")
		.map(String::as_str)
		.unwrap_or("confsync.db");
	let store = match DocStore::open(path.as_ref()) {
		Ok(store) => store,
		Err(err) => {
			error!("{}", err);
			return ExitCode::FAILURE;
		}
	};
	let result = store.for_each(|doc| {
		println!("{}", doc);
	});
	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("{}", err);
			ExitCode::FAILURE
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = cli().get_matches();
	logging::init_tracing(if matches.get_flag("debug") { "debug" } else { "info" });

	match matches.subcommand() {
		Some(("sync", sub)) => run_sync(sub).await,
		Some(("state", sub)) => run_state(sub),
		_ => ExitCode::FAILURE,
	}
}

// vim: ts=4
