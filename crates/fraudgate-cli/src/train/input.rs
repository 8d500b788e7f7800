use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, ValueHint};

use fraudgate_scoring::config::ModelType;
use fraudgate_scoring::training::TrainingConfig;

use crate::util::validate_tsv_or_csv_file;

/// Arguments shared by `train` and `retrain`.
pub fn training_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .help("Path to training configuration file (JSON)")
            .required(false)
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("transactions")
            .short('t')
            .long("transactions")
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
            .help(
                "Path to the transactions table. Overrides the transactions file \
                 specified in the configuration file.",
            )
            .value_hint(ValueHint::FilePath),
        Arg::new("identity")
            .short('i')
            .long("identity")
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
            .help(
                "Path to the identity table joined on the id column. Overrides the \
                 identity file specified in the configuration file.",
            )
            .value_hint(ValueHint::FilePath),
        Arg::new("model_dir")
            .short('m')
            .long("model-dir")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Directory holding versioned model artifacts.")
            .value_hint(ValueHint::DirPath),
        Arg::new("model_type")
            .long("model-type")
            .help("Override the model type from the JSON config.")
            .value_parser(["gbdt"])
            .value_hint(ValueHint::Other),
        Arg::new("no_promote")
            .long("no-promote")
            .help("Save the new version without pointing production at it.")
            .action(ArgAction::SetTrue),
    ]
}

/// Build a training config from an optional JSON file plus CLI overrides.
///
/// Fields absent from the file keep their defaults; fields with an invalid value
/// are reported and fall back to the default.
pub fn training_config_from_arguments(
    config_path: Option<&PathBuf>,
    matches: &ArgMatches,
) -> Result<TrainingConfig> {
    let mut config = TrainingConfig::default();

    if let Some(config_path) = config_path {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        );
                    }
                } else {
                    log::debug!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    );
                }
            };
        }

        load_or_default!(transactions_path);
        load_or_default!(identity_path);
        load_or_default!(model_dir);
        load_or_default!(model);
        load_or_default!(id_column);
        load_or_default!(label_column);
        load_or_default!(keep_columns);
        load_or_default!(max_missing_fraction);
        load_or_default!(validation_fraction);
        load_or_default!(seed);
        load_or_default!(promote);
    }

    // Apply CLI overrides
    if let Some(transactions) = matches.get_one::<String>("transactions") {
        config.transactions_path = PathBuf::from(transactions);
    }
    if let Some(identity) = matches.get_one::<String>("identity") {
        config.identity_path = Some(PathBuf::from(identity));
    }
    if let Some(model_dir) = matches.get_one::<PathBuf>("model_dir") {
        config.model_dir = model_dir.clone();
    }
    if let Some(model_type) = matches.get_one::<String>("model_type") {
        config.model.model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
    }
    if matches.get_flag("no_promote") {
        config.promote = false;
    }

    validate_tsv_or_csv_file(&config.transactions_path.to_string_lossy())?;
    if let Some(identity) = &config.identity_path {
        validate_tsv_or_csv_file(&identity.to_string_lossy())?;
    }

    Ok(config)
}

/// True when neither a config file nor a transactions table was given.
pub fn is_template_request(matches: &ArgMatches) -> bool {
    matches.get_one::<PathBuf>("config").is_none()
        && matches.get_one::<String>("transactions").is_none()
}
