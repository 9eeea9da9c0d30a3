use anyhow::{Context, Result, anyhow, bail};
use std::{env, fs, path::PathBuf};
use thtools::{
    ExportFormat, about, celsius_range::CelsiusRangeResult, config::ToeholdConfig,
};

fn usage() {
    eprintln!(
        "Usage:\n  \
  thtools_cli --version\n  \
  thtools_cli run CONFIG.json [--format text|csv|html|json] [--dp N] [--stream] [--output PATH]\n  \
  thtools_cli crt CONFIG.json [--format text|csv|html|json] [--dp N] [--output PATH]\n\n  \
  The sampler executable comes from the config, else THTOOLS_SAMPLER_BIN, else thtools-sampler on PATH.\n  \
  Set RUST_LOG=info for progress and timing."
    );
}

#[derive(Debug)]
struct OutputArgs {
    format: ExportFormat,
    dp: Option<usize>,
    stream: bool,
    output: Option<PathBuf>,
}

fn parse_output_args(args: &[String]) -> Result<OutputArgs> {
    let mut out = OutputArgs {
        format: ExportFormat::default(),
        dp: None,
        stream: false,
        output: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--format" => {
                let value = iter.next().ok_or_else(|| anyhow!("Missing value for --format"))?;
                out.format = value.parse()?;
            }
            "--dp" => {
                let value = iter.next().ok_or_else(|| anyhow!("Missing value for --dp"))?;
                out.dp = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid decimal places '{value}'"))?,
                );
            }
            "--stream" => out.stream = true,
            "--output" => {
                let value = iter.next().ok_or_else(|| anyhow!("Missing value for --output"))?;
                out.output = Some(PathBuf::from(value));
            }
            other => bail!("Unknown argument '{other}'"),
        }
    }
    Ok(out)
}

fn emit(text: &str, output: &OutputArgs) -> Result<()> {
    match &output.output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Could not write output '{}'", path.display()))?;
            eprintln!("Wrote '{}'", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn run_test(config: &ToeholdConfig, output: &OutputArgs) -> Result<()> {
    let test = config.into_test(config.engine())?;
    let mut result = if output.stream {
        let mut stream = test.generate(&config.run)?;
        for progress in stream.by_ref() {
            let progress = progress?;
            eprintln!(
                "chunk {} (rows {}..{}) done: {}/{} ({:.0}%)",
                progress.index,
                progress.rows.start,
                progress.rows.end,
                progress.completed,
                progress.total,
                progress.fraction_done() * 100.0
            );
        }
        stream.into_result()?
    } else {
        test.run(&config.run)?
    };
    if let Some(name) = &config.name {
        result.set_name(name);
    }
    emit(&output.format.render(&result, output.dp)?, output)
}

fn run_crt(config: &ToeholdConfig, output: &OutputArgs) -> Result<()> {
    if output.stream {
        bail!("--stream is only supported by 'run'");
    }
    let crt = config.into_celsius_range_test(config.engine())?;
    let mut results = vec![];
    for (result, celsius) in crt.generate(&config.run).zip(crt.celsius_range()) {
        let result = result?;
        eprintln!(
            "{celsius} °C: target {} with specificity {:.2}%",
            result.target().join("+"),
            result.specificity() * 100.0
        );
        results.push(result);
    }
    let result = CelsiusRangeResult::new(results, crt.celsius_range().to_vec())?;
    emit(&output.format.render(&result, output.dp)?, output)
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        bail!("Missing command");
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    let command = &args[1];
    if !matches!(command.as_str(), "run" | "crt") {
        usage();
        bail!("Unknown command '{command}'");
    }
    let Some(config_path) = args.get(2) else {
        usage();
        bail!("Missing config path for {command}");
    };
    let config = ToeholdConfig::load_from_path(config_path)?;
    let output = parse_output_args(&args[3..])?;
    match command.as_str() {
        "run" => run_test(&config, &output),
        _ => run_crt(&config, &output),
    }
}
