use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use tstprj_core::{AttrValue, Project};

#[derive(Parser, Debug)]
#[command(
    name = "tstprj-cli",
    about = "Dump and edit VoiSona .tstprj projects via key paths",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Dump a project as markup text or JSON
    Dump(DumpArgs),
    /// Get attribute values at a key path
    Get(QueryArgs),
    /// List child elements and attributes at a key path
    List(QueryArgs),
    /// Set every attribute a key path matches; writes in place or to --out
    Set(SetArgs),
    /// Find project files under a directory
    Ls(LsArgs),
    /// Zip a timestamped backup next to a project file
    Backup(BackupArgs),
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    /// Project file to dump
    path: PathBuf,
    /// Emit JSON instead of markup text
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Entity-escape attribute values in markup output
    #[arg(long, default_value_t = false)]
    escape: bool,
}

#[derive(ClapArgs, Debug)]
struct QueryArgs {
    /// Project file to load
    path: PathBuf,
    /// Dot-separated key path starting at the document root,
    /// e.g. Song.Track.name
    #[arg(long)]
    key: String,
}

#[derive(ClapArgs, Debug)]
struct SetArgs {
    /// Project file to load
    path: PathBuf,
    /// Dot-separated key path whose final key names the attribute
    #[arg(long)]
    key: String,
    /// New value; parsed with the type of the matched attribute
    #[arg(long)]
    value: String,
    /// Optional output path; defaults to rewriting the input file
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct LsArgs {
    /// Directory to scan (defaults to the current directory)
    path: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct BackupArgs {
    /// Project file to back up
    path: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Get(a) => cmd_get(a),
        Cmd::List(a) => cmd_list(a),
        Cmd::Set(a) => cmd_set(a),
        Cmd::Ls(a) => cmd_ls(a),
        Cmd::Backup(a) => cmd_backup(a),
    }
}

fn open_project(path: &PathBuf) -> Project {
    let mut project = Project::new();
    if let Err(e) = project.open(path) {
        eprintln!("error: {}", e);
        std::process::exit(2);
    }
    project
}

fn cmd_dump(args: DumpArgs) {
    let mut project = open_project(&args.path);
    if args.json {
        let tree = project.tree().expect("document was just opened");
        let value = tstprj_core::json::document_json(tree).unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            std::process::exit(3);
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap());
    } else {
        match project.to_markup_text(args.escape) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(3);
            }
        }
    }
}

fn cmd_get(args: QueryArgs) {
    let project = open_project(&args.path);
    let values = project
        .get_by_path(&args.key)
        .expect("document was just opened");
    if values.is_empty() {
        eprintln!("not found: {}", args.key);
        std::process::exit(3);
    }
    for value in values {
        println!("{}", value);
    }
}

fn cmd_list(args: QueryArgs) {
    let project = open_project(&args.path);
    let elements = project
        .elements_by_path(&args.key)
        .expect("document was just opened");
    if elements.is_empty() {
        eprintln!("not found: {}", args.key);
        std::process::exit(3);
    }
    for element in elements {
        let tree = element.tree();
        for attr in tree.attributes(element.id()) {
            println!("{}\t{:?}\t{}", attr.key(), attr.attr_type(), attr.value());
        }
        for &child in tree.children(element.id()) {
            println!("{}\telement", tree.key(child));
        }
    }
}

fn cmd_set(args: SetArgs) {
    let mut project = open_project(&args.path);
    let current = project
        .get_by_path(&args.key)
        .expect("document was just opened");
    let Some(first) = current.first() else {
        eprintln!("not found: {}", args.key);
        std::process::exit(3);
    };
    // The stream is typed; the new value must parse as what is there.
    let value = match first {
        AttrValue::Int(_) => match args.value.parse::<i32>() {
            Ok(n) => AttrValue::Int(n),
            Err(e) => {
                eprintln!("invalid int value: {}", e);
                std::process::exit(4);
            }
        },
        AttrValue::Double(_) => match args.value.parse::<f64>() {
            Ok(x) => AttrValue::Double(x),
            Err(e) => {
                eprintln!("invalid double value: {}", e);
                std::process::exit(4);
            }
        },
        AttrValue::Str(_) => AttrValue::Str(args.value.clone()),
    };
    let n = project
        .set_by_path(&args.key, value)
        .expect("document was just opened");
    let out = args.out.unwrap_or(args.path);
    if let Err(e) = project.save(&out) {
        eprintln!("error writing: {}", e);
        std::process::exit(5);
    }
    println!("updated {} attribute(s) in {}", n, out.display());
}

fn cmd_ls(args: LsArgs) {
    let root = args.path.unwrap_or_else(|| PathBuf::from("."));
    for path in tstprj_core::backup::find_project_files(&root) {
        println!("{}", path.display());
    }
}

fn cmd_backup(args: BackupArgs) {
    match tstprj_core::backup::zip_backup_file(&args.path) {
        Ok(dest) => println!("{}", dest.display()),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}
