mod demo;

use clap::Parser as ClapParser;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use colored::Colorize;
use raybridge::{setup, ApiSource, DuplicatePolicy, FrameLoop, Namespace, Palette, SetupConfig};
use raybridge_common::error::BridgeError;
use raybridge_common::native::SharedModule;
use raybridge_layout::{resolve, ResolvedApi};
use raybridge_runtime_headless::HeadlessModule;
use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

#[derive(ClapParser)]
#[command(name = "raybridge")]
#[command(version)]
#[command(about = "Bind a raylib-style API into an interpreter namespace", long_about = None)]
struct Cli {
    /// API description (raylib_api.json); the bundled subset if omitted
    api: Option<PathBuf>,

    /// Setup config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the tokens and parse of one C type string
    #[arg(long, value_name = "TYPE")]
    dump_tokens: Option<String>,

    /// Print every resolved struct layout
    #[arg(long)]
    dump_layouts: bool,

    /// Print the binding catalog after setup
    #[arg(long)]
    dump_catalog: bool,

    /// Resolve the API only (no setup)
    #[arg(long)]
    check: bool,

    /// Frames to run the demo script for
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Let later bindings replace earlier ones
    #[arg(long)]
    overwrite: bool,

    /// Do not install the named colors
    #[arg(long)]
    manual_palette: bool,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) {
    use std::io::IsTerminal;
    use tracing_subscriber::{EnvFilter, fmt};

    let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_error(err: &BridgeError) {
    let mut files = SimpleFiles::new();

    let diagnostic = match err {
        BridgeError::TypeSyntax {
            message,
            input,
            span,
        } => {
            let file_id = files.add("<type>", input.clone());
            Diagnostic::error()
                .with_message("Type syntax error")
                .with_labels(vec![Label::primary(file_id, span.range()).with_message(message)])
        }
        BridgeError::NotInitialized
        | BridgeError::UnknownSymbol { .. }
        | BridgeError::DuplicateBinding { .. } => Diagnostic::error()
            .with_message(err.to_string())
            .with_notes(vec!["setup aborted before any script ran".into()]),
        other => Diagnostic::error().with_message(other.to_string()),
    };

    let writer = StandardStream::stderr(ColorChoice::Auto);
    let config = term::Config::default();
    let _ = term::emit(&mut writer.lock(), &config, &files, &diagnostic);
}

fn fail(err: &BridgeError) -> ! {
    print_error(err);
    process::exit(1);
}

fn load_config(cli: &Cli) -> Result<SetupConfig, BridgeError> {
    let mut config = match &cli.config {
        Some(path) => SetupConfig::from_json_file(path)?,
        None => SetupConfig::default(),
    };
    if let Some(path) = &cli.api {
        config.api = ApiSource::File(path.clone());
    }
    if cli.overwrite {
        config.duplicates = DuplicatePolicy::Overwrite;
    }
    if cli.manual_palette {
        config.palette = Palette::Manual;
    }
    Ok(config)
}

fn dump_layouts(api: &ResolvedApi) {
    for (name, layout) in api.types.entries() {
        if name != layout.name {
            println!("{} = {}", name.bold(), layout.name);
            continue;
        }
        println!("{} ({} bytes)", name.bold(), layout.size);
        for field in &layout.fields {
            println!("  +{:<3} {}: {}", field.offset, field.name, field.kind);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Some(ty) = &cli.dump_tokens {
        for tok in raybridge_lexer::tokenize(ty) {
            println!("{:?} @ {}..{}", tok.token, tok.span.start, tok.span.end);
        }
        match raybridge_parser::parse_ctype(ty) {
            Ok(parsed) => println!("{}: {parsed}", "type".cyan().bold()),
            Err(err) => fail(&err),
        }
        return;
    }

    let config = load_config(&cli).unwrap_or_else(|err| fail(&err));

    if cli.check || cli.dump_layouts {
        let api = config
            .api
            .load()
            .and_then(|api| resolve(&api))
            .unwrap_or_else(|err| fail(&err));
        if cli.dump_layouts {
            dump_layouts(&api);
        }
        if cli.check {
            println!(
                "{}: {} functions, {} structs, {} constants ({} skipped)",
                "ok".green().bold(),
                api.functions.len(),
                api.types.len(),
                api.constants.len(),
                api.skipped.len()
            );
        }
        return;
    }

    let headless = Rc::new(RefCell::new(HeadlessModule::default()));
    let shared: SharedModule = headless.clone();
    let mut ns = Namespace::new();
    let session = setup(shared, &mut ns, &config).unwrap_or_else(|err| fail(&err));

    if cli.dump_catalog {
        for function in session.bridge.functions() {
            let signature = function
                .signature()
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            let kind = function.kind().to_string();
            println!("{:<20} {kind:<8} {signature}", function.name());
        }
        println!(
            "{}: {} bound, {} skipped, {} globals",
            "ok".green().bold(),
            session.bridge.len(),
            session.skipped.len(),
            ns.len()
        );
        return;
    }

    demo::install(&mut ns);
    let report = FrameLoop::new(cli.frames)
        .run(&mut ns)
        .unwrap_or_else(|err| fail(&err));

    let module = headless.borrow();
    println!(
        "{}: ran {} frames ({} errors), {} draw commands, {} live blocks",
        "ok".green().bold(),
        report.frames,
        report.errors,
        module.draw_log().len(),
        module.live_blocks()
    );
}
