use serde::{Deserialize, Serialize};

use crate::error::{Result, TypingError};
use crate::options::TypingOverrides;
use crate::typed::{EraseOptions, SentenceOptions, Typed, TypedConfig, WaitOptions};

pub const SCRIPT_VERSION: u32 = 1;

/// A saved animation: engine configuration plus the instructions to queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub version: u32,
    #[serde(default)]
    pub config: TypedConfig,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    Type {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        part: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<TypingOverrides>,
    },
    Backspace {
        count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        part: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<TypingOverrides>,
    },
    Wait {
        ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        part: Option<String>,
    },
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        let script: Script =
            serde_json::from_str(json).map_err(|err| TypingError::Script(err.to_string()))?;
        if script.version != SCRIPT_VERSION {
            return Err(TypingError::Script(format!(
                "unsupported script version {}; expected {SCRIPT_VERSION}",
                script.version
            )));
        }
        Ok(script)
    }

    /// Queue every instruction on `typed`, in order.
    pub fn enqueue(&self, typed: &Typed) -> Result<()> {
        for instruction in &self.instructions {
            match instruction.clone() {
                Instruction::Type {
                    text,
                    part,
                    style,
                    options,
                } => {
                    typed.type_text(
                        &text,
                        SentenceOptions {
                            part,
                            style,
                            overrides: options,
                        },
                    )?;
                }
                Instruction::Backspace {
                    count,
                    part,
                    options,
                } => {
                    typed.backspace(
                        count,
                        EraseOptions {
                            part,
                            overrides: options,
                        },
                    )?;
                }
                Instruction::Wait { ms, part } => {
                    typed.wait(ms, WaitOptions { part })?;
                }
            }
        }
        Ok(())
    }

    /// Sum of explicit waits, ignoring typing time.
    pub fn total_wait_ms(&self) -> u64 {
        self.instructions
            .iter()
            .map(|instruction| match instruction {
                Instruction::Wait { ms, .. } => *ms,
                _ => 0,
            })
            .fold(0u64, u64::saturating_add)
    }
}
