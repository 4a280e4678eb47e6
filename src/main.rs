use anyhow::Context;
use behavior_rhythm::config::{presets_as_json, Args};
use behavior_rhythm::data_loading::read_csv_file;
use behavior_rhythm::features::compute_features_with;
use behavior_rhythm::filtering::filter_channels;
use behavior_rhythm::output::{write_features, write_features_to_csv};
use clap::Parser;
use log::{debug, info};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();

    if args.list_presets {
        println!("{}", presets_as_json()?);
        return Ok(());
    }

    let (Some(input_path), Some(sample_rate)) = (args.input_path.as_ref(), args.sample_rate)
    else {
        anyhow::bail!("an input file and --sample-rate are required");
    };

    let mut table = read_csv_file(input_path)?;
    info!(
        "Loaded {} channels from {}",
        table.channel_names.len(),
        input_path.display()
    );

    if let Some(prefilter) = &args.prefilter {
        debug!("Prefiltering with {:?}", prefilter);
        table.traces = filter_channels(&table.traces, sample_rate, prefilter)
            .context("Prefilter failed")?;
    }

    let config = args.feature_config();
    let features = compute_features_with(&table.traces, sample_rate, &config)
        .with_context(|| format!("Feature extraction failed for {}", input_path.display()))?;

    match &args.output {
        Some(path) => write_features_to_csv(path, &table.channel_names, &features)?,
        None => write_features(std::io::stdout().lock(), &table.channel_names, &features)?,
    }

    Ok(())
}
