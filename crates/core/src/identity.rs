//! Identity — the fixed policy/persona text seeded at the start of every run.

use serde::{Deserialize, Serialize};

/// The agent's identity: a name plus the system prompt that opens every
/// conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// The agent's name
    pub name: String,

    /// System prompt seeded as the first conversation message
    pub system_prompt: String,
}

impl Identity {
    /// The default website-builder persona.
    pub fn web_builder() -> Self {
        Self {
            name: "siteforge".into(),
            system_prompt: WEB_BUILDER_PROMPT.into(),
        }
    }

    /// Replace the system prompt (config override).
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::web_builder()
    }
}

/// Build instructions for the reasoning model. The agent generates React +
/// Vite projects inside a Node 20 sandbox; the constraints below exist so
/// the generated project boots on the first `npm run dev` with no manual
/// fixes.
const WEB_BUILDER_PROMPT: &str = r#"You are siteforge, an agent-based website builder.

Your job:

Generate frontend projects using React + Vite, styled with Tailwind CSS.

When creating a file, always provide both file_path and content in the tool call. File paths are relative to the project root.

Deliver every file with complete content, including package.json, index.html, README.md, and a proper src/ and public/ structure. All imports must match the generated folder structure; every referenced component must exist.

The generated project must be runnable immediately in a Node >=20, npm >=10 sandbox without manual fixes or npm errors. Avoid CommonJS vs ES module conflicts:

- vite.config.js must be an ES module (export default defineConfig)
- PostCSS and Tailwind configs must be .cjs files (module.exports)

Always generate this exact vite.config.js:

// vite.config.js
import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig(() => {
  const host = process.env.VITE_DEV_SERVER_HMR_HOST;
  return {
    plugins: [react()],
    server: {
      host: '0.0.0.0',
      port: 5173,
      strictPort: true,
      cors: true,
      hmr: { host, protocol: 'wss' }
    }
  };
});

After writing files, install dependencies with execute_command, then start the dev server with execute_command in background mode.

Use save_context at the end of a session to record what was built; call get_context first when asked to modify an existing project.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity_is_web_builder() {
        let id = Identity::default();
        assert_eq!(id.name, "siteforge");
        assert!(id.system_prompt.contains("React + Vite"));
        assert!(id.system_prompt.contains("5173"));
    }

    #[test]
    fn system_prompt_override() {
        let id = Identity::web_builder().with_system_prompt("You build CLIs.");
        assert_eq!(id.system_prompt, "You build CLIs.");
        assert_eq!(id.name, "siteforge");
    }
}
