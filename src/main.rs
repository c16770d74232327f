//! CLI entry point for `mailframe`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailframe::config::{self, Config};
use mailframe::i18n;
use mailframe::model::content::EmailContent;
use mailframe::parser;
use mailframe::render::classify::{self, Classification};
use mailframe::render::sanitize::AmmoniaSanitizer;
use mailframe::render::strip::strip_inline_images;
use mailframe::render::theme::HostTheme;
use mailframe::render::{prepare, RenderEnv};

#[derive(Parser)]
#[command(name = "mailframe", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language (en, es). Defaults to system locale.
    #[arg(long, global = true, value_name = "LANG")]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an email as a themed standalone document
    Render {
        path: PathBuf,
        /// Host theme: dark, light or auto (defaults to the config file)
        #[arg(long)]
        theme: Option<HostTheme>,
        /// System dark-mode preference used by --theme auto
        #[arg(long, value_name = "BOOL")]
        system_dark: Option<bool>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the layout classification of an email body
    Classify {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the HTML body with inline images removed
    Strip { path: PathBuf },
    /// Render every .eml file in a directory
    Batch {
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        theme: Option<HostTheme>,
    },
    /// Write the default configuration file
    Init,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Detect language early from --lang arg or system env, before clap processes --help.
fn detect_lang_early() -> i18n::Lang {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--lang" {
            if let Some(lang) = args.get(i + 1).and_then(|c| i18n::Lang::from_code(c)) {
                return lang;
            }
        }
        if let Some(lang) = arg
            .strip_prefix("--lang=")
            .and_then(i18n::Lang::from_code)
        {
            return lang;
        }
    }
    i18n::detect_system_lang()
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command() -> clap::Command {
    let mut cmd = Cli::command()
        .about(i18n::app_about())
        .long_about(i18n::app_long_about())
        .after_help(i18n::app_after_help());

    for (name, about) in [
        ("render", i18n::help_cmd_render()),
        ("classify", i18n::help_cmd_classify()),
        ("strip", i18n::help_cmd_strip()),
        ("batch", i18n::help_cmd_batch()),
        ("init", i18n::help_cmd_init()),
        ("completions", i18n::help_cmd_completions()),
        ("manpage", i18n::help_cmd_manpage()),
    ] {
        cmd = cmd.mut_subcommand(name, |s| s.about(about));
    }
    cmd
}

fn main() -> anyhow::Result<()> {
    // Detect language BEFORE clap parsing so --help is localized
    i18n::set_lang(detect_lang_early());

    let matches = build_localized_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Render {
            path,
            theme,
            system_dark,
            output,
        } => {
            let env = render_env(&config, theme, system_dark);
            cmd_render(&path, env, output.as_deref(), &config)
        }
        Commands::Classify { path, json } => cmd_classify(&path, json),
        Commands::Strip { path } => cmd_strip(&path),
        Commands::Batch { dir, output, theme } => {
            let env = render_env(&config, theme, None);
            cmd_batch(&dir, &output, env, &config)
        }
        Commands::Init => {
            config::save_config(&config)?;
            if let Some(path) = config::config_file_path() {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("mailframe.log"));
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Theme inputs from the config file, overridden by CLI flags.
fn render_env(config: &Config, theme: Option<HostTheme>, system_dark: Option<bool>) -> RenderEnv {
    let mut env = config.display.render_env();
    if let Some(theme) = theme {
        env.host_theme = theme;
    }
    if let Some(dark) = system_dark {
        env.system_prefers_dark = dark;
    }
    env
}

fn load(path: &Path) -> anyhow::Result<EmailContent> {
    if !path.exists() {
        anyhow::bail!("{}: {}", i18n::err_file_not_found(), path.display());
    }
    Ok(parser::load_content(path)?)
}

/// Render one email to a file or stdout.
fn cmd_render(
    path: &Path,
    env: RenderEnv,
    output: Option<&Path>,
    config: &Config,
) -> anyhow::Result<()> {
    let content = load(path)?;
    let sanitizer = AmmoniaSanitizer::email();
    let prepared = prepare(&content, env, Some(&sanitizer), config.render.unsanitized)?;

    match output {
        Some(out) => {
            std::fs::write(out, &prepared.document)?;
            tracing::info!(
                input = %path.display(),
                output = %out.display(),
                structured = prepared.classification.is_structured,
                "Rendered email"
            );
        }
        None => println!("{}", prepared.document),
    }
    Ok(())
}

/// Print the classification of one email body.
fn cmd_classify(path: &Path, json: bool) -> anyhow::Result<()> {
    let content = load(path)?;
    let classification = content
        .usable_html()
        .map(classify::classify)
        .unwrap_or_default();

    if json {
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "classification": classification,
            "attachments": content.attachments.iter().map(|a| serde_json::json!({
                "name": a.display_name(),
                "kind": a.kind(),
                "inline": a.inline,
                "size": a.size,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_classification_table(&content, &classification);
    }
    Ok(())
}

fn print_classification_table(content: &EmailContent, c: &Classification) {
    println!();
    println!("  {:<20} {}", i18n::label_score(), c.score);
    println!("  {:<20} {}", i18n::label_structured(), c.is_structured);
    println!("  {:<20} {}", i18n::label_prefer_white(), c.prefer_white);
    println!("  {:<20} {}", i18n::label_forced_plain(), c.looks_plain);
    println!("  {:<20} {}", i18n::label_tables(), c.table_count);
    println!("  {:<20} {}", i18n::label_styles(), c.style_count);
    if !c.signals.is_empty() {
        println!();
        println!("  {}:", i18n::label_signals());
        for signal in &c.signals {
            println!("    +{}  {signal:?}", signal.weight());
        }
    }
    if !content.attachments.is_empty() {
        println!();
        for att in &content.attachments {
            println!(
                "    {:<8} {:<40} {:>10}{}",
                format!("{:?}", att.kind()),
                att.display_name(),
                att.size_label(),
                if att.inline { "  (inline)" } else { "" }
            );
        }
    }
    println!();
}

/// Print the stripped HTML body of one email.
fn cmd_strip(path: &Path) -> anyhow::Result<()> {
    let content = load(path)?;
    if let Some(html) = content.usable_html() {
        println!("{}", strip_inline_images(html, &content.attachments));
    }
    Ok(())
}

/// Render every `.eml` file in `dir` into `output`.
fn cmd_batch(dir: &Path, output: &Path, env: RenderEnv, config: &Config) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{}: {}", i18n::err_not_a_directory(), dir.display());
    }
    std::fs::create_dir_all(output)?;

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
        })
        .collect();
    inputs.sort();

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}",
                i18n::msg_rendering()
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let sanitizer = AmmoniaSanitizer::email();
    let mut rendered = 0usize;
    let mut failed = 0usize;
    for input in &inputs {
        let result = parser::eml::load_eml(input)
            .and_then(|content| prepare(&content, env, Some(&sanitizer), config.render.unsanitized));
        match result {
            Ok(prepared) => {
                let stem = input.file_stem().unwrap_or_default();
                let out = output.join(stem).with_extension("html");
                std::fs::write(&out, &prepared.document)?;
                rendered += 1;
            }
            Err(e) => {
                tracing::warn!(file = %input.display(), error = %e, "Skipping email");
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "  {} {rendered}, {} {failed} \u{2192} {}",
        i18n::msg_rendered(),
        i18n::msg_failed(),
        output.display()
    );
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailframe", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
