//! lessc - compile LESS to CSS with less.js on V8
//!
//! Single-shot mode:
//!   lessc <input.less> [output.css]
//!   lessc - < input.less
//!
//! Server mode (persistent process, reads from stdin):
//!   lessc --server [--import-dir <dir>]
//!
//! Protocol (server mode):
//!   Request (stdin):
//!     Filename:site.less
//!     Length:27
//!
//!     @c: red; .a { color: @c; }
//!
//!   Response (stdout):
//!     Status:Ok
//!     Length:19
//!
//!     .a { color: red; }
//!
//!   Error response:
//!     Status:Error
//!     Length:42
//!
//!     Unable to process LESS input from site.less...

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use lesscss::{parse_var, write_css, CompileRequest, CompilerConfig, ConsoleOutput, LessCompiler};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "lessc", about = "Compile LESS to CSS using less.js on an embedded V8 runtime", version)]
struct Cli {
    /// LESS file to compile ("-" reads stdin).
    #[arg(value_name = "INPUT", required_unless_present = "server")]
    input: Option<PathBuf>,

    /// Where to write the CSS (stdout when omitted).
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Keep the runtime alive and serve length-prefixed requests on stdin.
    #[arg(long, conflicts_with_all = ["input", "output"])]
    server: bool,

    /// less.js script to load (defaults to LESSC_LESS_JS, then the bundled copy).
    #[arg(long = "less-js", value_name = "PATH")]
    less_js: Option<PathBuf>,

    /// Directory @import may read from for stdin and server input.
    #[arg(long = "import-dir", value_name = "DIR")]
    import_dir: Option<PathBuf>,

    /// Minify the generated CSS.
    #[arg(short = 'x', long)]
    compress: bool,

    /// Only evaluate math inside parentheses.
    #[arg(long = "strict-math")]
    strict_math: bool,

    /// Fail on incompatible units.
    #[arg(long = "strict-units")]
    strict_units: bool,

    /// Keep line breaks instead of collapsing whitespace (keeps // comments intact).
    #[arg(long = "preserve-whitespace")]
    preserve_whitespace: bool,

    /// Define a variable before the source (NAME=VALUE, repeatable).
    #[arg(long = "global-var", value_name = "NAME=VALUE")]
    global_vars: Vec<String>,

    /// Override a variable after the source (NAME=VALUE, repeatable).
    #[arg(long = "modify-var", value_name = "NAME=VALUE")]
    modify_vars: Vec<String>,

    /// Abort a compile after this many milliseconds (0 = no limit).
    #[arg(long = "timeout-ms", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// V8 heap limit in MiB (0 = unlimited).
    #[arg(long = "max-heap-mb", value_name = "MB")]
    max_heap_mb: Option<usize>,
}

impl Cli {
    fn config(&self) -> Result<CompilerConfig> {
        let mut config = CompilerConfig::from_env();

        if let Some(path) = &self.less_js {
            config.less_script = Some(path.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(mb) = self.max_heap_mb {
            config.max_heap_size = (mb > 0).then(|| mb * 1024 * 1024);
        }

        config.options.compress = self.compress;
        config.options.strict_math = self.strict_math;
        config.options.strict_units = self.strict_units;
        config.options.preserve_whitespace = self.preserve_whitespace;
        config.options.global_vars = vars(&self.global_vars, "--global-var")?;
        config.options.modify_vars = vars(&self.modify_vars, "--modify-var")?;

        Ok(config)
    }
}

fn vars(pairs: &[String], flag: &str) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| parse_var(pair).ok_or_else(|| anyhow!("{} expects NAME=VALUE, got '{}'", flag, pair)))
        .collect()
}

fn print_console(console: &ConsoleOutput) {
    for log in &console.logs {
        eprintln!("[LOG] {}", log);
    }
    for warn in &console.warns {
        eprintln!("[WARN] {}", warn);
    }
    for err in &console.errors {
        eprintln!("[ERROR] {}", err);
    }
}

/// Run in single-shot mode
fn run_single_shot(cli: &Cli, compiler: &mut LessCompiler) -> Result<()> {
    let input = cli.input.as_deref().ok_or_else(|| anyhow!("Missing input file"))?;

    let result = if input == Path::new("-") {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;

        let options = compiler.config().options.clone();
        let mut request = CompileRequest::new("(stdin)", &source);
        if let Some(dir) = &cli.import_dir {
            request = request.with_base_dir(dir);
        }
        compiler
            .compile_with(&request, &options)
            .map_err(anyhow::Error::from)
            .and_then(|css| emit(cli.output.as_deref(), &css))
    } else {
        match &cli.output {
            Some(output) => compiler.compile_file(input, output).map_err(anyhow::Error::from),
            None => compiler
                .compile_path(input)
                .map_err(anyhow::Error::from)
                .and_then(|css| emit(None, &css)),
        }
    };

    print_console(&compiler.take_console());
    result
}

fn emit(output: Option<&Path>, css: &str) -> Result<()> {
    match output {
        Some(path) => write_css(path, css).map_err(anyhow::Error::from),
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(css.as_bytes())?;
            if !css.ends_with('\n') {
                writeln!(stdout)?;
            }
            Ok(())
        }
    }
}

/// Largest request body accepted in server mode.
const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// One request read off stdin in server mode
#[derive(Debug)]
struct ServerRequest {
    filename: String,
    source: String,
}

/// Read the next request. `Ok(None)` on EOF.
fn read_request(reader: &mut impl BufRead) -> Result<Option<ServerRequest>> {
    let mut filename_line = String::new();
    if reader.read_line(&mut filename_line)? == 0 {
        return Ok(None);
    }

    let mut length_line = String::new();
    reader.read_line(&mut length_line)?;

    let mut blank = String::new();
    reader.read_line(&mut blank)?;

    let filename = filename_line
        .trim()
        .strip_prefix("Filename:")
        .map(|name| name.trim().to_string())
        .ok_or_else(|| anyhow!("Expected 'Filename:' header, got '{}'", filename_line.trim()))?;

    let length: usize = length_line
        .trim()
        .strip_prefix("Length:")
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| anyhow!("Expected 'Length:<bytes>' header, got '{}'", length_line.trim()))?;

    if length > MAX_REQUEST_BYTES {
        // Skip the body so the next request still starts on a header line
        io::copy(&mut reader.by_ref().take(length as u64), &mut io::sink())?;
        bail!("Request of {} bytes exceeds the {} byte limit", length, MAX_REQUEST_BYTES);
    }

    let mut body = Vec::with_capacity(length);
    reader.by_ref().take(length as u64).read_to_end(&mut body)?;
    if body.len() != length {
        bail!("Request body ended after {} of {} bytes", body.len(), length);
    }
    let source = String::from_utf8(body).map_err(|e| anyhow!("Request body is not UTF-8: {}", e))?;

    Ok(Some(ServerRequest { filename, source }))
}

/// Run in server mode (persistent process, reads requests from stdin)
fn run_server(cli: &Cli, compiler: &mut LessCompiler) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut reader = stdin.lock();

    eprintln!("[lessc] Server ready, reading from stdin...");

    loop {
        let request = match read_request(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                write_response(&mut stdout, false, &format!("{:#}", e))?;
                continue;
            }
        };

        let options = compiler.config().options.clone();
        let mut compile = CompileRequest::new(&request.filename, &request.source);
        if let Some(dir) = &cli.import_dir {
            compile = compile.with_base_dir(dir);
        }

        match compiler.compile_with(&compile, &options) {
            Ok(css) => write_response(&mut stdout, true, &css)?,
            Err(e) => write_response(&mut stdout, false, &format!("{:#}", anyhow::Error::from(e)))?,
        }

        print_console(&compiler.take_console());
    }

    eprintln!("[lessc] Server shutting down");
    Ok(())
}

/// Write response in length-prefixed protocol
fn write_response(stdout: &mut std::io::Stdout, ok: bool, body: &str) -> Result<()> {
    let status = if ok { "Ok" } else { "Error" };

    writeln!(stdout, "Status:{}", status)?;
    writeln!(stdout, "Length:{}", body.len())?;
    writeln!(stdout)?;
    write!(stdout, "{}", body)?;
    stdout.flush()?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    let mut compiler = LessCompiler::with_config(config)?;

    if cli.server {
        return run_server(&cli, &mut compiler);
    }
    if cli.input.is_none() {
        bail!("Missing input file");
    }
    run_single_shot(&cli, &mut compiler)
}
