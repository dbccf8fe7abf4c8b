//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{CodelangArgs, OutputFormat};
use crate::error::Result;

/// Outcome of one backend in a training run.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackendSummary {
    pub backend: String,
    pub status: String,
    pub training_ms: u64,
    pub accuracy: Option<f64>,
}

/// Summary of one training run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub max_vocabulary: usize,
    pub vocabulary_size: usize,
    pub backends: Vec<BackendSummary>,
}

/// Result structure for train and sweep.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingResult {
    pub output: String,
    pub samples: usize,
    pub languages: usize,
    pub runs: Vec<RunSummary>,
    pub duration_ms: u64,
}

/// Label assigned to one file.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileClassification {
    pub path: String,
    pub language: String,
}

/// Result structure for classification.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub backend: String,
    pub max_vocabulary: usize,
    pub files: Vec<FileClassification>,
}

/// Accuracy of one bundled model.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub backend: String,
    pub max_vocabulary: usize,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

/// Result structure for evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub sample_dir: String,
    pub models: Vec<ModelEvaluation>,
}

/// Description of one backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub description: String,
}

/// Result structure for the backend listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackendList {
    pub backends: Vec<BackendInfo>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &CodelangArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &CodelangArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    // Convert to JSON value for easier manipulation
    let value = serde_json::to_value(result)?;

    match result {
        _ if std::any::type_name::<T>().contains("TrainingResult") => {
            output_training_human(&value)
        }
        _ if std::any::type_name::<T>().contains("ClassificationResult") => {
            output_classification_human(&value)
        }
        _ if std::any::type_name::<T>().contains("EvaluationResult") => {
            output_evaluation_human(&value)
        }
        _ => output_generic_human(&value),
    }
}

/// Output training runs in human format.
fn output_training_human(value: &serde_json::Value) -> Result<()> {
    if let Some(obj) = value.as_object() {
        if let Some(runs) = obj.get("runs").and_then(|r| r.as_array()) {
            for run in runs {
                let max = run.get("max_vocabulary").and_then(|m| m.as_u64()).unwrap_or(0);
                let size = run
                    .get("vocabulary_size")
                    .and_then(|s| s.as_u64())
                    .unwrap_or(0);
                println!("Vocabulary: {size} tokens (max {max})");
                println!("─────────────");
                if let Some(backends) = run.get("backends").and_then(|b| b.as_array()) {
                    for backend in backends {
                        let name = backend.get("backend").and_then(|n| n.as_str()).unwrap_or("?");
                        let status = backend.get("status").and_then(|s| s.as_str()).unwrap_or("?");
                        let ms = backend
                            .get("training_ms")
                            .and_then(|t| t.as_u64())
                            .unwrap_or(0);
                        match backend.get("accuracy").and_then(|a| a.as_f64()) {
                            Some(accuracy) => println!(
                                "{name:<12} {status} ({ms}ms, accuracy {:.1}%)",
                                accuracy * 100.0
                            ),
                            None => println!("{name:<12} {status} ({ms}ms)"),
                        }
                    }
                }
                println!();
            }
        }

        if let Some(output) = obj.get("output").and_then(|o| o.as_str()) {
            println!("Bundle written to: {output}");
        }
        if let Some(duration) = obj.get("duration_ms").and_then(|d| d.as_u64()) {
            println!("Total time: {duration}ms");
        }
    }
    Ok(())
}

/// Output file labels in human format.
fn output_classification_human(value: &serde_json::Value) -> Result<()> {
    if let Some(files) = value.get("files").and_then(|f| f.as_array()) {
        for file in files {
            let path = file.get("path").and_then(|p| p.as_str()).unwrap_or("?");
            let language = file.get("language").and_then(|l| l.as_str()).unwrap_or("?");
            println!("{path}: {language}");
        }
    }
    Ok(())
}

/// Output model accuracies in human format.
fn output_evaluation_human(value: &serde_json::Value) -> Result<()> {
    if let Some(models) = value.get("models").and_then(|m| m.as_array()) {
        for model in models {
            let backend = model.get("backend").and_then(|b| b.as_str()).unwrap_or("?");
            let max = model.get("max_vocabulary").and_then(|m| m.as_u64()).unwrap_or(0);
            let correct = model.get("correct").and_then(|c| c.as_u64()).unwrap_or(0);
            let total = model.get("total").and_then(|t| t.as_u64()).unwrap_or(0);
            let accuracy = model.get("accuracy").and_then(|a| a.as_f64()).unwrap_or(0.0);
            println!(
                "{backend:<12} K={max:<6} {correct}/{total} ({:.1}%)",
                accuracy * 100.0
            );
        }
    }
    Ok(())
}

/// Output generic data in human format.
fn output_generic_human(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                match val {
                    serde_json::Value::Array(items) => {
                        println!("{key}:");
                        for item in items {
                            let formatted_item = format_value(item);
                            println!("  {formatted_item}");
                        }
                    }
                    _ => {
                        let formatted_val = format_value(val);
                        println!("{key}: {formatted_val}");
                    }
                }
            }
        }
        _ => {
            let formatted_value = format_value(value);
            println!("{formatted_value}");
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &CodelangArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(obj) => obj
            .values()
            .map(format_value)
            .collect::<Vec<_>>()
            .join("  "),
        serde_json::Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(
            format_value(&serde_json::Value::String("test".to_string())),
            "test"
        );
        assert_eq!(
            format_value(&serde_json::Value::Number(serde_json::Number::from(42))),
            "42"
        );
        assert_eq!(format_value(&serde_json::Value::Bool(false)), "false");
        assert_eq!(format_value(&serde_json::Value::Null), "null");
        assert_eq!(format_value(&serde_json::json!(["go", "rust"])), "[go, rust]");
    }

    #[test]
    fn test_format_object_values() {
        let value = serde_json::json!({"name": "knn", "description": "K-nearest neighbors"});
        let formatted = format_value(&value);
        assert!(formatted.contains("knn"));
        assert!(formatted.contains("K-nearest neighbors"));
    }
}
