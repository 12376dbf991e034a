//! `gobdump`: print the types and values of a gob stream without the Go
//! definitions that produced it.
//!
//! ```text
//! gobdump [-i FILE] [-o FILE] [--trunc] [--b64 | --b64url] [--nc]
//!         [--style single-line|commented|json] [--stream]
//!         [--seed N | --no-rand]
//! ```
//!
//! Exit code 1 means at least one gob failed to decode. Failures go to
//! stderr with a hexdump of the offending frame.
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use clap::{Parser, ValueEnum};

use gobdump::{CancelToken, Decoder, DecoderConfig, Gob, NamingMode, Style, hexdump, render_types, render_value};

#[derive(Parser)]
#[command(name = "gobdump", version, about = "Dump the types and values of a gob stream")]
struct Cli {
    /// File to read; stdin when absent.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// File to write; stdout when absent. Appended to unless --trunc.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Truncate the output file instead of appending.
    #[arg(long)]
    trunc: bool,

    /// Input is base64 text.
    #[arg(long, conflicts_with = "b64url")]
    b64: bool,

    /// Input is URL-safe base64 text.
    #[arg(long)]
    b64url: bool,

    /// Leave out the `//` framing comments.
    #[arg(long)]
    nc: bool,

    #[arg(long, value_enum, default_value_t = StyleArg::Commented)]
    style: StyleArg,

    /// Keep going past decode errors, resynchronising on the next frame.
    #[arg(long)]
    stream: bool,

    /// Seed for the suffix of anonymous struct names.
    #[arg(long, allow_negative_numbers = true, conflicts_with = "no_rand")]
    seed: Option<i64>,

    /// Name anonymous structs `Anon<id>` with no random suffix.
    #[arg(long)]
    no_rand: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    SingleLine,
    Commented,
    Json,
}

impl From<StyleArg> for Style {
    fn from(s: StyleArg) -> Self {
        match s {
            StyleArg::SingleLine => Style::SingleLine,
            StyleArg::Commented => Style::CommentedSingleLine,
            StyleArg::Json => Style::Json,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("gobdump: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every gob decoded cleanly.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let reader = open_input(cli)?;
    let mut out = open_output(cli)?;

    let naming = match (cli.seed, cli.no_rand) {
        (_, true) => NamingMode::Plain,
        (Some(seed), false) => NamingMode::Seeded(seed as u64),
        (None, false) => NamingMode::Process,
    };
    let decoder = Decoder::with_config(reader, DecoderConfig::default().with_naming(naming));
    let printer = Printer {
        comments: !cli.nc,
        style: match (Style::from(cli.style), cli.nc) {
            (Style::CommentedSingleLine, true) => Style::SingleLine,
            (style, _) => style,
        },
    };

    let mut clean = true;
    let mut count = 0;
    if cli.stream {
        for item in decoder.decode_stream(CancelToken::new(), 16) {
            match item {
                Ok(gob) => {
                    count += 1;
                    printer.print(&mut out, count, &gob)?;
                }
                Err(e) => {
                    clean = false;
                    out.flush()?;
                    report(&e);
                }
            }
        }
    } else {
        let mut decoder = decoder;
        loop {
            match decoder.next_gob() {
                Ok(Some(gob)) => {
                    count += 1;
                    printer.print(&mut out, count, &gob)?;
                }
                Ok(None) => break,
                Err(e) => {
                    clean = false;
                    out.flush()?;
                    report(&e);
                    break;
                }
            }
        }
    }
    out.flush()?;
    log::debug!("decoded {count} gobs");
    Ok(clean)
}

fn open_input(cli: &Cli) -> anyhow::Result<Box<dyn Read + Send>> {
    let mut reader: Box<dyn Read + Send> = match &cli.input {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(f))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };
    if !(cli.b64 || cli.b64url) {
        return Ok(reader);
    }

    let mut text = String::new();
    reader.read_to_string(&mut text).context("reading base64 input")?;
    let text: String = text.split_whitespace().collect();
    let text = text.trim_end_matches('=');
    if text.is_empty() {
        bail!("base64 input is empty");
    }
    let engine = if cli.b64url { URL_SAFE_NO_PAD } else { STANDARD_NO_PAD };
    let data = engine.decode(text).context("decoding base64 input")?;
    Ok(Box::new(io::Cursor::new(data)))
}

fn open_output(cli: &Cli) -> anyhow::Result<Box<dyn Write>> {
    Ok(match &cli.output {
        Some(path) => {
            let f = OpenOptions::new()
                .create(true)
                .write(true)
                .append(!cli.trunc)
                .truncate(cli.trunc)
                .open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn report(err: &gobdump::Error) {
    eprintln!("{err}");
    if !err.raw.is_empty() {
        eprint!("{}", hexdump(&err.raw));
    }
}

struct Printer {
    comments: bool,
    style: Style,
}

impl Printer {
    fn print(&self, out: &mut dyn Write, n: usize, gob: &Gob) -> io::Result<()> {
        if !self.comments {
            out.write_all(render_types(&gob.types).as_bytes())?;
            return writeln!(out, "{}", render_value(&gob.value, self.style));
        }
        writeln!(out, "// Decoded gob #{n}")?;
        gob.write_types(out)?;
        gob.write_value(out, self.style)?;
        writeln!(out, "// End gob #{n}\n")
    }
}
