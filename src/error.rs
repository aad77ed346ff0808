use thiserror::Error;

/// Per-item and per-stage failures. None of these abort a batch on their own.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed job record at index {index}: {reason}")]
    DataShape { index: usize, reason: String },

    #[error("Job '{job_id}' is missing required field '{field}'")]
    Format { job_id: String, field: &'static str },

    #[error("Delivery of message {index} failed at chunk {chunk}: {reason}")]
    Delivery {
        index: usize,
        chunk: usize,
        reason: String,
    },

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = PipelineError::Format {
            job_id: "abc".to_string(),
            field: "url",
        };
        assert_eq!(err.to_string(), "Job 'abc' is missing required field 'url'");

        let err = PipelineError::Delivery {
            index: 2,
            chunk: 1,
            reason: "HTTP 429".to_string(),
        };
        assert!(err.to_string().contains("message 2"));
        assert!(err.to_string().contains("HTTP 429"));
    }
}
