#![deny(clippy::needless_borrow)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use jlower::{frontend, LoweringOptions};

type TerminatingResult = std::result::Result<(), Box<dyn std::error::Error>>;

struct Settings {
    options : LoweringOptions,
    keep_going : bool,
    only : Option<String>,
}

/// Expands each path into the `.class` files it names, searching directories recursively.
fn class_files<'a>(paths : impl IntoIterator<Item=&'a str>) -> Result<Vec<PathBuf>, walkdir::Error> {
    let is_dir_or_class = |e : &walkdir::DirEntry| {
        e.file_type().is_dir() ||
            e.file_name().to_str().map(|s| s.ends_with(".class")).unwrap_or(false)
    };
    let mut out = Vec::new();
    for path in paths {
        let walk = walkdir::WalkDir::new(path).sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walk.into_iter().filter_entry(is_dir_or_class) {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                out.push(entry.into_path());
            }
        }
    }
    Ok(out)
}

fn lower_file(path : &Path, settings : &Settings, out : &mut dyn Write) -> TerminatingResult {
    let class = frontend::parse_class(path)?;
    for method in frontend::method_inputs(&class)? {
        if settings.only.as_ref().map_or(false, |n| n != &method.name) {
            continue;
        }
        match jlower::lower_method_with(&method, &settings.options) {
            Ok(body) => writeln!(out, "{}", body)?,
            Err(e) if settings.keep_going => warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn list_signatures(path : &Path, out : &mut dyn Write) -> TerminatingResult {
    let class = frontend::parse_class(path)?;
    for method in frontend::method_inputs(&class)? {
        writeln!(out, "{}", method.signature())?;
    }
    Ok(())
}

fn init_logging(verbose : bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[test]
fn test_class_files() -> TerminatingResult {
    let root = std::env::temp_dir().join(format!("jlower-cli-{}", std::process::id()));
    std::fs::create_dir_all(root.join("nested"))?;
    for name in &[ "B.class", "A.class", "notes.txt", "nested/C.class" ] {
        File::create(root.join(name))?;
    }

    let root_str = root.to_str().ok_or("expected Unicode path")?;
    let found = class_files(vec![ root_str ])?;
    let names : Vec<_> = found.iter().filter_map(|p| p.file_name()?.to_str()).collect();
    assert_eq!(vec![ "A.class", "B.class", "C.class" ], names);

    let single = root.join("A.class");
    let found = class_files(vec![ single.to_str().ok_or("expected Unicode path")? ])?;
    assert_eq!(vec![ single ], found);

    std::fs::remove_dir_all(&root)?;
    Ok(())
}

fn main() -> TerminatingResult {
    use clap::*;

    let verbose = || Arg::with_name("verbose")
                        .short("v")
                        .long("verbose")
                        .help("Logs progress at debug level unless RUST_LOG says otherwise");
    let paths = || Arg::with_name("paths")
                        .help("Names .class files, or directories to search for them")
                        .multiple(true)
                        .required(true);

    let m =
        app_from_crate!()
            .subcommand(
                SubCommand::with_name("lower")
                    .about("Lowers the methods of JVM .class files into register IR")
                    .arg(Arg::with_name("output")
                            .short("o")
                            .long("output")
                            .help("Writes the IR to this file instead of standard output")
                            .takes_value(true)
                        )
                    .arg(Arg::with_name("method")
                            .short("m")
                            .long("method")
                            .help("Lowers only methods with this name")
                            .takes_value(true)
                        )
                    .arg(Arg::with_name("line-numbers")
                            .long("line-numbers")
                            .help("Annotates statements with source line numbers")
                        )
                    .arg(Arg::with_name("keep-going")
                            .long("keep-going")
                            .help("Reports methods that fail to lower and continues with the rest")
                        )
                    .arg(verbose())
                    .arg(paths())
                )
            .subcommand(
                SubCommand::with_name("signatures")
                    .about("Lists the signatures of the methods that would be lowered")
                    .arg(verbose())
                    .arg(paths())
                )
            .get_matches();

    if let Some(m) = m.subcommand_matches("lower") {
        init_logging(m.is_present("verbose"));
        let settings = Settings {
            options : LoweringOptions { keep_line_numbers : m.is_present("line-numbers") },
            keep_going : m.is_present("keep-going"),
            only : m.value_of("method").map(ToOwned::to_owned),
        };
        let mut out : Box<dyn Write> = match m.value_of("output") {
            Some(f) => Box::new(File::create(f)?),
            None => Box::new(std::io::stdout()),
        };
        let ins = m.values_of("paths").ok_or("expected at least one input path")?;
        for file in class_files(ins)? {
            info!("lowering {}", file.display());
            lower_file(&file, &settings, &mut *out)?;
        }
        out.flush()?;
    } else if let Some(m) = m.subcommand_matches("signatures") {
        init_logging(m.is_present("verbose"));
        let ins = m.values_of("paths").ok_or("expected at least one input path")?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for file in class_files(ins)? {
            list_signatures(&file, &mut out)?;
        }
    }

    Ok(())
}
