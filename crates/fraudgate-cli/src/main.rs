use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use fraudgate_cli::monitor;
use fraudgate_cli::registry;
use fraudgate_cli::retrain::retrain;
use fraudgate_cli::score::{score, ScoreInput, ScoreRequest};
use fraudgate_cli::train::input::{
    is_template_request, training_args, training_config_from_arguments,
};
use fraudgate_cli::train::trainer;
use fraudgate_scoring::monitoring::drift::DEFAULT_ALPHA;

fn model_dir_arg() -> Arg {
    Arg::new("model_dir")
        .short('m')
        .long("model-dir")
        .help("Directory holding versioned model artifacts")
        .default_value("models")
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::DirPath)
}

fn prediction_log_arg() -> Arg {
    Arg::new("log")
        .short('l')
        .long("log")
        .help("Path to the CSV prediction log")
        .default_value("logs/predictions.csv")
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FRAUDGATE_LOG", "error,fraudgate=info"))
        .init();

    let matches = Command::new("fraudgate")
        .version(clap::crate_version!())
        .about("Fraud scoring: train, serve and monitor transaction models")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a new model version from transaction tables")
                .args(training_args()),
        )
        .subcommand(
            Command::new("score")
                .about("Score transactions with the production model")
                .arg(model_dir_arg())
                .arg(
                    Arg::new("record")
                        .short('r')
                        .long("record")
                        .help("Single transaction as an inline JSON object")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .conflicts_with("input")
                        .required_unless_present("input"),
                )
                .arg(
                    Arg::new("input")
                        .short('d')
                        .long("input")
                        .help("File of transactions (*.json, *.csv or *.tsv)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("log")
                        .short('l')
                        .long("log")
                        .help("Append every prediction to this CSV log")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Write predictions as JSON lines here. Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("versions")
                .about("List model versions and the production pointer")
                .arg(model_dir_arg()),
        )
        .subcommand(
            Command::new("promote")
                .about("Point production at an existing model version")
                .arg(model_dir_arg())
                .arg(
                    Arg::new("version")
                        .help("Version to promote")
                        .required(true)
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("monitor")
                .about("Check served traffic for drift and performance")
                .subcommand_required(true)
                .subcommand(
                    Command::new("drift")
                        .about("KS test of logged TransactionAmt against the training table")
                        .arg(prediction_log_arg())
                        .arg(
                            Arg::new("train_data")
                                .short('t')
                                .long("train-data")
                                .help("Training transactions table (*.csv or *.tsv)")
                                .required(true)
                                .value_parser(clap::value_parser!(PathBuf))
                                .value_hint(ValueHint::FilePath),
                        )
                        .arg(
                            Arg::new("alpha")
                                .long("alpha")
                                .help("Significance level for the KS test")
                                .default_value("0.05")
                                .value_parser(clap::value_parser!(f64)),
                        ),
                )
                .subcommand(
                    Command::new("performance")
                        .about("Summarise logged predictions")
                        .arg(prediction_log_arg()),
                ),
        )
        .subcommand(
            Command::new("retrain")
                .about("Retrain when drift or an AUC drop is reported")
                .args(training_args())
                .arg(
                    Arg::new("drift_detected")
                        .long("drift-detected")
                        .help("Drift was detected on live traffic")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("auc")
                        .long("auc")
                        .help("AUC measured on recently labelled traffic")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Retrain even when no trigger fired")
                        .action(ArgAction::SetTrue),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("score", sub_m)) => handle_score(sub_m),
        Some(("versions", sub_m)) => handle_versions(sub_m),
        Some(("promote", sub_m)) => handle_promote(sub_m),
        Some(("monitor", sub_m)) => handle_monitor(sub_m),
        Some(("retrain", sub_m)) => handle_retrain(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn exit_on_error<T>(what: &str, result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("{} failed: {:#}", what, e);
            std::process::exit(1)
        }
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    if is_template_request(matches) {
        eprintln!("[fraudgate::train] No config file provided; printing the default config.");
        println!("{}", trainer::config_template()?);
        return Ok(());
    }

    let config_path: Option<&PathBuf> = matches.get_one("config");
    log::info!("[fraudgate::train] Training with config: {:?}", config_path);
    let result = training_config_from_arguments(config_path, matches)
        .and_then(|config| trainer::train(&config));
    exit_on_error("Training", result)
}

fn handle_score(matches: &ArgMatches) -> Result<()> {
    let input = match matches.get_one::<String>("record") {
        Some(record) => ScoreInput::Record(record.clone()),
        None => match matches.get_one::<PathBuf>("input") {
            Some(path) => ScoreInput::File(path.clone()),
            None => unreachable!("--record or --input is required by CLI configuration"),
        },
    };
    let request = ScoreRequest {
        model_dir: model_dir(matches),
        input,
        log: matches.get_one::<PathBuf>("log").cloned(),
        output: matches.get_one::<PathBuf>("output_file").cloned(),
    };
    exit_on_error("Scoring", score(&request))
}

fn handle_versions(matches: &ArgMatches) -> Result<()> {
    exit_on_error("Listing versions", registry::list_versions(&model_dir(matches)))
}

fn handle_promote(matches: &ArgMatches) -> Result<()> {
    let version = *matches
        .get_one::<u32>("version")
        .unwrap_or_else(|| unreachable!("version is required by CLI configuration"));
    exit_on_error("Promotion", registry::promote(&model_dir(matches), version))
}

fn handle_monitor(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("drift", drift_m)) => {
            let train_data = drift_m
                .get_one::<PathBuf>("train_data")
                .unwrap_or_else(|| unreachable!("train-data is required by CLI configuration"));
            let alpha = drift_m.get_one::<f64>("alpha").copied().unwrap_or(DEFAULT_ALPHA);
            exit_on_error(
                "Drift check",
                monitor::drift(&prediction_log(drift_m), train_data, alpha),
            )
        }
        Some(("performance", perf_m)) => exit_on_error(
            "Performance check",
            monitor::performance(&prediction_log(perf_m)),
        ),
        _ => unreachable!(),
    }
}

fn handle_retrain(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    let drift_detected = matches.get_flag("drift_detected");
    let auc = matches.get_one::<f64>("auc").copied();
    let force = matches.get_flag("force");

    let result = retrain(
        || training_config_from_arguments(config_path, matches),
        drift_detected,
        auc,
        force,
    );
    exit_on_error("Retraining", result)
}

fn model_dir(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("model_dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("models"))
}

fn prediction_log(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("log")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("logs/predictions.csv"))
}
