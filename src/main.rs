use anyhow::{Context, Result};
use elastic_pipes::cli::commands::{ListCommand, NewPipeCommand, PipeCommand, RunCommand};
use elastic_pipes::cli::output::{format_pipe_info, format_run_event, style, PipeInfo, CHECK, CROSS};
use elastic_pipes::cli::{logging, scaffold, Cli, Command};
use elastic_pipes::core::runtime::configure_runtime;
use elastic_pipes::core::{PipelineFile, PipesError, RuntimeOptions, State};
use elastic_pipes::execution::{entries_for, run_standalone, Registry, Runner};
use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::from_args();

    let result = match &cli.command {
        Command::Run(cmd) => run_pipeline(&cli, cmd).await,
        Command::Pipe(cmd) => run_pipe(&cli, cmd).await,
        Command::List(cmd) => list_pipes(cmd),
        Command::NewPipe(cmd) => new_pipe(cmd),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // user errors are printed as they are, anything else gets its context chain
            match e.downcast_ref::<PipesError>() {
                Some(e) => eprintln!("{}", e),
                None => eprintln!("{} {:#}", CROSS, e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_pipeline(cli: &Cli, cmd: &RunCommand) -> Result<()> {
    let file = PipelineFile::from_file(&cmd.file)?;
    logging::init(&cli.log_level, &file.pipes()?)?;

    let mut state = State::from_value(file.state)?;
    let options = RuntimeOptions::new()
        .with_arguments(&cmd.arguments)
        .with_process_environment()
        .with_base_dir(file.base_dir)
        .in_memory_state(true);
    configure_runtime(&mut state, &options)?;

    let registry = Arc::new(Registry::with_builtins()?);
    let runner = Runner::new(registry)
        .dry_run(cmd.dry_run)
        .with_event_handler(|event| eprintln!("{}", format_run_event(&event)));
    runner.run(&mut state).await
}

async fn run_pipe(cli: &Cli, cmd: &PipeCommand) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read state from stdin")?;
    logging::init(&cli.log_level, &entries_for(&input, &cmd.name))?;

    let registry = Arc::new(Registry::with_builtins()?);
    let runner = Runner::new(registry);
    let options = RuntimeOptions::new()
        .with_arguments(&cmd.arguments)
        .with_process_environment();
    run_standalone(&runner, &cmd.name, input.as_bytes(), std::io::stdout(), options).await
}

fn list_pipes(cmd: &ListCommand) -> Result<()> {
    let registry = Registry::with_builtins()?;
    let pipes: Vec<PipeInfo> = registry.iter().map(|pipe| PipeInfo::from(&pipe.decl)).collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&pipes)?);
    } else {
        let blocks: Vec<String> = pipes.iter().map(format_pipe_info).collect();
        println!("{}", blocks.join("\n\n"));
    }
    Ok(())
}

fn new_pipe(cmd: &NewPipeCommand) -> Result<()> {
    let path = scaffold::new_pipe(&cmd.path, cmd.force)?;
    eprintln!("{} Created {}", CHECK, style(path.display()).bold());
    Ok(())
}
