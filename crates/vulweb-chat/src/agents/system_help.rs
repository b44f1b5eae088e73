//! Usage guidance; also the router's fallback.

use async_trait::async_trait;
use vulweb_core::platform::PlatformQuery;
use vulweb_core::types::AgentReply;

use super::CapabilityAgent;
use crate::context::ConversationContext;
use crate::error::ChatError;

const KEYWORDS: &[&str] = &[
    "help",
    "how to",
    "what is",
    "can i",
    "support",
    "format",
    "error",
    "problem",
    "issue",
    "guide",
];

const SUPPORTED_FORMATS: &str = "Supported file formats:

**Models:**
- .pkl (Pickle)
- .pt, .pth (PyTorch)
- .h5 (Keras/TensorFlow)

**Datasets:**
- .json (JSON)
- .csv (CSV)
- .txt (Text)
- .zip (Compressed archives)

You can upload files through the respective pages or ask me to help you!";

const UPLOAD_GUIDE: &str = "To upload a model:

1. Go to the Models page
2. Click the \"Add Model\" button
3. Fill in the model information (name, description, version, type)
4. Upload your model file (.pkl, .pt, .pth, or .h5)
5. Click \"Create Model\"

Or just tell me the details and I can help guide you through the process!";

const TRAINING_GUIDE: &str = "To start training:

1. Make sure you have both a model and dataset uploaded
2. Go to the Training page
3. Click \"Start Training\"
4. Enter a task name
5. Select your model and dataset
6. Set the number of epochs
7. Click \"Start Training\"

The training will run in the background and you can monitor progress in real-time!";

const GENERAL_HELP: &str = "I'm here to help! I can assist with:

- Platform features and how to use them
- Supported file formats
- Troubleshooting issues
- Best practices for model training
- Integration guidance

What would you like to know?";

pub struct SystemHelpAgent;

#[async_trait]
impl CapabilityAgent for SystemHelpAgent {
    fn name(&self) -> &'static str {
        "System Assistant"
    }

    fn description(&self) -> &'static str {
        "I provide help with platform usage, answer questions, and troubleshoot issues."
    }

    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    async fn handle(
        &self,
        message: &str,
        _context: &ConversationContext,
        _platform: &dyn PlatformQuery,
    ) -> Result<AgentReply, ChatError> {
        let lower = message.to_lowercase();
        let has = |word: &str| lower.contains(word);

        let content = if has("format") && has("support") {
            SUPPORTED_FORMATS
        } else if has("how") && has("upload") && has("model") {
            UPLOAD_GUIDE
        } else if has("how") && has("train") {
            TRAINING_GUIDE
        } else {
            GENERAL_HELP
        };
        Ok(AgentReply::text(content))
    }
}
