use anyhow::Result;
use colored::Colorize;

use docloops_history::{HistoryMetrics, HistoryQuery, HistoryStore};

pub fn handle_history_command(
    store: &HistoryStore,
    doc_type: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let mut query = HistoryQuery::default().limit(limit);
    if let Some(doc_type) = doc_type {
        query = query.doc_type(doc_type);
    }

    let metrics = store.metrics();
    let cycles = store.cycles(&query);

    if json {
        let output = serde_json::json!({
            "metrics": metrics,
            "cycles": cycles,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_metrics(&metrics);

    if cycles.is_empty() {
        println!("{}", "No cycles recorded.".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", "Recent cycles".bold());
    for cycle in &cycles {
        let delta = format!("{:+}", cycle.total_improvement);
        let delta = if cycle.total_improvement > 0 {
            delta.green()
        } else if cycle.total_improvement < 0 {
            delta.red()
        } else {
            delta.dimmed()
        };
        println!(
            "  {}  {:<10} {:<30} {:>3} -> {:>3} ({})  {} iter, {}",
            cycle.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            cycle.doc_type,
            cycle.doc_id,
            cycle.initial_score,
            cycle.final_score,
            delta,
            cycle.iteration_count,
            cycle.stop_reason.replace('_', " ")
        );
    }

    Ok(())
}

fn print_metrics(metrics: &HistoryMetrics) {
    println!("{}", "History".bold());
    println!("  Evaluations:          {}", metrics.total_evaluations);
    println!("  Improvements:         {}", metrics.total_improvements);
    println!("  Cycles:               {}", metrics.total_cycles);
    println!("  Average score:        {:.1}", metrics.average_evaluation_score);
    println!("  Average improvement:  {:+.1}", metrics.average_improvement);

    if !metrics.by_doc_type.is_empty() {
        println!();
        println!("{}", "By document type".bold());
        for (doc_type, stats) in &metrics.by_doc_type {
            println!(
                "  {:<10} {} evaluations, {} cycles, avg score {:.1}, avg improvement {:+.1}",
                doc_type, stats.evaluations, stats.cycles, stats.average_score, stats.average_improvement
            );
        }
    }

    if !metrics.most_improved_documents.is_empty() {
        println!();
        println!("{}", "Most improved".bold());
        for doc in &metrics.most_improved_documents {
            println!("  {:+4}  {}", doc.total_improvement, doc.doc);
        }
    }
}
