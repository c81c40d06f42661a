// ABOUTME: Aggregator that merges per-worker invocation results into one response text.
// ABOUTME: Sections follow selection order; failed workers are reported, never hidden.

use super::types::InvocationResult;

/// Response returned when no worker was selected or none produced a result.
pub const NO_AGENTS_MESSAGE: &str = "No agents were able to process your request.";

/// Merge results into a single response.
///
/// - No results: [`NO_AGENTS_MESSAGE`].
/// - One result: its output verbatim, or `Error: <description>`.
/// - Several: a `## <identity>` section per worker in the given order,
///   followed by a note with the contributor and failure counts.
pub fn aggregate(results: &[InvocationResult]) -> String {
    match results {
        [] => NO_AGENTS_MESSAGE.to_string(),
        [only] => match &only.output {
            Some(output) if only.success => output.clone(),
            _ => format!("Error: {}", error_text(only)),
        },
        _ => aggregate_sections(results),
    }
}

fn aggregate_sections(results: &[InvocationResult]) -> String {
    let mut sections = Vec::with_capacity(results.len() + 1);
    let mut failed = 0;

    for result in results {
        match &result.output {
            Some(output) if result.success => {
                sections.push(format!("## {}\n\n{}", result.identity, output.trim_end()));
            }
            _ => {
                failed += 1;
                sections.push(format!(
                    "## {} (error)\n\n{}",
                    result.identity,
                    error_text(result)
                ));
            }
        }
    }

    let total = results.len();
    let note = if failed == 0 {
        format!("---\n{} agents contributed to this response.", total)
    } else {
        format!(
            "---\n{} agents contributed to this response ({} failed).",
            total, failed
        )
    };
    sections.push(note);

    sections.join("\n\n")
}

fn error_text(result: &InvocationResult) -> &str {
    result.error.as_deref().unwrap_or("unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(id: &str, output: &str) -> InvocationResult {
        InvocationResult::succeeded(id, "q", output.to_string(), Duration::from_millis(10))
    }

    fn err(id: &str, error: &str) -> InvocationResult {
        InvocationResult::failed(id, "q", error.to_string(), Duration::from_millis(10))
    }

    #[test]
    fn empty_results_yield_no_agents_message() {
        assert_eq!(aggregate(&[]), NO_AGENTS_MESSAGE);
    }

    #[test]
    fn single_success_is_returned_verbatim() {
        let response = aggregate(&[ok("tickets", "You have 3 open tickets.\n")]);
        assert_eq!(response, "You have 3 open tickets.\n");
    }

    #[test]
    fn single_failure_is_reported() {
        assert_eq!(
            aggregate(&[err("tickets", "timed out after 100ms")]),
            "Error: timed out after 100ms"
        );
    }

    #[test]
    fn sections_follow_input_order() {
        let response = aggregate(&[ok("B", "from b"), ok("A", "from a")]);
        let b = response.find("## B").unwrap();
        let a = response.find("## A").unwrap();
        assert!(b < a);
        assert!(response.contains("from b"));
        assert!(response.ends_with("2 agents contributed to this response."));
    }

    #[test]
    fn failed_sections_are_marked_and_counted() {
        let response = aggregate(&[
            ok("tickets", "3 open tickets"),
            err("cost", "timed out after 100ms"),
        ]);
        assert!(response.contains("## tickets\n\n3 open tickets"));
        assert!(response.contains("## cost (error)\n\ntimed out after 100ms"));
        assert!(response.ends_with("2 agents contributed to this response (1 failed)."));
    }

    #[test]
    fn missing_error_text_still_renders() {
        let mut result = err("x", "");
        result.error = None;
        assert_eq!(aggregate(&[result]), "Error: unknown error");
    }
}
