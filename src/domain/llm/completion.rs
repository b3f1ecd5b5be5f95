//! Narrow model-call contract used by the generator, the engine and the
//! model grader.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// A single prompt-in, text-out model call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: 0.7,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Model-call collaborator: returns the generated text or a typed failure
#[async_trait]
pub trait TextCompletion: Send + Sync + Debug {
    async fn complete(&self, request: CompletionRequest) -> Result<String, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;

    type Handler = Arc<dyn Fn(&CompletionRequest) -> Result<String, DomainError> + Send + Sync>;

    /// Completion stub driven by a closure over the request
    #[derive(Clone)]
    pub struct ScriptedCompletion {
        handler: Handler,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedCompletion {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&CompletionRequest) -> Result<String, DomainError> + Send + Sync + 'static,
        {
            Self {
                handler: Arc::new(handler),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn always(text: impl Into<String>) -> Self {
            let text = text.into();
            Self::new(move |_| Ok(text.clone()))
        }

        pub fn failing(error: DomainError) -> Self {
            Self::new(move |_| Err(error.clone()))
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl Debug for ScriptedCompletion {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ScriptedCompletion").finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        async fn complete(&self, request: CompletionRequest) -> Result<String, DomainError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            (self.handler)(&request)
        }
    }
}
