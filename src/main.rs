use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use bowclass::config::Opts;
use bowclass::pipeline::{self, Outcome};
use bowclass::utils::read_line;
use bowclass::{BowErr, OrbExtractor};

fn print_summary(outcome: &Outcome) -> Result<()> {
    let report = &outcome.report;
    println!(
        "Images: {} loaded ({} positive, {} negative), {} unreadable, {} without descriptors",
        report.loaded, report.positive, report.negative, report.unreadable, report.degenerate
    );
    println!("Percentage error over the test set was {} percent", outcome.test_error);
    println!("Percentage error over the training set was {} percent", outcome.train_error);
    if !outcome.converged {
        println!(
            "Training did not converge within {} epochs, last mean squared error {}",
            outcome.model.epochs(),
            outcome.model.loss()
        );
    }

    let split = outcome.split()?;
    // Training partition: diagnostic only
    for (label, prediction) in outcome
        .classifier
        .diagnostic_predictions(&outcome.model, &split)
    {
        println!(
            "[train] expected {:<8} predicted {:<8} scores {:?}",
            label, prediction.label, prediction.scores
        );
    }
    let holdout = outcome
        .classifier
        .holdout_predictions(&outcome.model, &split);
    let correct = holdout.iter().filter(|(l, p)| *l == p.label).count();
    println!("[test] {}/{} held-out images classified correctly", correct, holdout.len());
    Ok(())
}

fn interactive<R: BufRead>(outcome: &Outcome, extractor: &OrbExtractor, mut input: R) -> Result<()> {
    let prompt = "Enter the path to an image to classify, or quit to exit: ";
    while let Some(answer) = read_line(&mut input, prompt)? {
        if answer == "quit" {
            break;
        }
        if answer.is_empty() {
            continue;
        }
        match pipeline::classify_image(outcome, extractor, Path::new(&answer)) {
            Ok(prediction) => println!(
                "{}: {} (scores {:?})",
                answer, prediction.label, prediction.scores
            ),
            Err(BowErr::ImageRead(path)) => warn!("Could not read image {}", path.display()),
            Err(e) => return Err(e).with_context(|| format!("failed to classify {}", answer)),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    let extractor = OrbExtractor {
        max_features: opts.max_features,
    };

    let outcome = pipeline::run(&opts, &extractor)
        .with_context(|| format!("training on {} failed", opts.training_dir.display()))?;
    print_summary(&outcome)?;

    if !opts.no_interactive {
        let stdin = std::io::stdin();
        interactive(&outcome, &extractor, stdin.lock())?;
    }
    Ok(())
}
