use std::{fs, path::PathBuf, process::ExitCode};

use clap::{CommandFactory, Parser, error::ErrorKind};

use duke::{class, runtime::Interpreter};

#[derive(Parser)]
#[clap(author, about, version)]
struct Args {
    /// Class to start execution in; defaults to the only loaded class
    #[clap(long)]
    main_class: Option<String>,

    /// Compiled class files to load
    #[clap(required = true)]
    class_files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("duke: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> duke::Result<()> {
    let mut classes = Vec::with_capacity(args.class_files.len());
    for path in &args.class_files {
        let bytes = fs::read(path)?;
        let klass = class::parse(&bytes)?;
        log::debug!("loaded {} from {}", klass.name(), path.display());
        classes.push(klass);
    }

    let main_class = match &args.main_class {
        Some(name) => name.clone(),
        None if classes.len() == 1 => classes[0].name().to_string(),
        None => Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "--main-class is required when loading more than one class file",
            )
            .exit(),
    };

    let vm = Interpreter::with_main_class(classes, main_class);
    if let Some(value) = vm.run()? {
        log::debug!("entry method returned {value:?}");
    }
    Ok(())
}
