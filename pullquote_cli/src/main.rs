use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use clap::Parser;
use owo_colors::OwoColorize;
use pullquote_cli::QuoteCli;
use pullquote_core::CancelSignal;
use pullquote_core::Pipeline;
use pullquote_core::QuoteConfig;
use pullquote_core::QuoteError;
use pullquote_core::RunOptions;
use pullquote_core::RunReport;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: i32 = 1;
const EXIT_CHANGES_DETECTED: i32 = 2;

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = QuoteCli::parse();

	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(&args, use_color);

	let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

	match run(&args, &root) {
		Ok(report) => {
			if report_changes(&args, &report, &root) {
				process::exit(EXIT_CHANGES_DETECTED);
			}
		}
		Err(e) => {
			match e.downcast::<QuoteError>() {
				Ok(quote_err) => {
					let report: miette::Report = (*quote_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(EXIT_FAILURE);
		}
	}
}

/// Log to stderr. `PULLQUOTE_LOG` wins over `--verbose` and `DEBUG=1`.
fn init_tracing(args: &QuoteCli, use_color: bool) {
	let verbose = args.verbose || std::env::var("DEBUG").is_ok_and(|value| value == "1");
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_env("PULLQUOTE_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.without_time()
		.try_init()
		.ok();
}

fn run(args: &QuoteCli, root: &Path) -> Result<RunReport, Box<dyn std::error::Error>> {
	let config = QuoteConfig::load(root)?.unwrap_or_default();
	let options = RunOptions {
		check: args.check,
		discovery: args.discovery(root),
		config,
	};

	let runtime = tokio::runtime::Runtime::new()?;
	let report = runtime.block_on(async {
		let cancel = CancelSignal::new();
		let interrupt = cancel.clone();

		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				eprintln!("interrupted, cancelling");
				interrupt.cancel();
			}
		});

		Pipeline::default().run(options, &cancel).await
	})?;

	Ok(report)
}

/// Print what changed. Returns `true` when check mode found changes.
fn report_changes(args: &QuoteCli, report: &RunReport, root: &Path) -> bool {
	for change in &report.changes {
		let rel = make_relative(&change.path, root);

		if args.check {
			eprintln!("{} {rel}", colored!("out of date:", bold));
		} else {
			println!("Updated {rel}");
		}

		if args.diff {
			print_diff(&change.original, &change.updated);
		}
	}

	if !args.check {
		return false;
	}

	if report.has_changes() {
		eprintln!(
			"changes detected in {} of {} document(s)",
			report.changes.len(),
			report.documents
		);
		true
	} else {
		eprintln!("no changes detected");
		false
	}
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
