//! Agent profiles and phase tasks.
//!
//! Every phase invocation pairs an [`AgentProfile`] (who the model is
//! playing) with a [`TaskBrief`] (what this call must produce). Both are plain
//! text; the invoker renders them into a system and a user message.

use fixdesk_config::DeviceModel;

/// Role, goal and persona text for one specialist.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl AgentProfile {
    /// The system prompt for this profile.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a {}.\n\n{}\n\nYour goal: {}",
            self.role, self.backstory, self.goal
        )
    }
}

/// What a single invocation must produce.
#[derive(Debug, Clone)]
pub struct TaskBrief {
    pub description: String,
    pub expected_output: String,
}

/// The three dialogue phases that call the completion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    DeviceIdentification,
    SymptomGathering,
    ProblemSolving,
}

impl Phase {
    /// Human-readable name, used in in-band error notices.
    pub fn label(self) -> &'static str {
        match self {
            Phase::DeviceIdentification => "device identification",
            Phase::SymptomGathering => "symptom gathering",
            Phase::ProblemSolving => "problem solving",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn catalog_lines(devices: &[DeviceModel]) -> String {
    devices
        .iter()
        .map(|d| format!("  - {}", d.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn device_agent(devices: &[DeviceModel]) -> AgentProfile {
    AgentProfile {
        role: "Device Support Specialist".into(),
        goal: "Identify and confirm exactly which supported device the user has".into(),
        backstory: format!(
            "You are an experienced device support specialist. You support only these devices:\n{}\n\n\
             Always make sure the user has one of the supported models before going further, \
             and ask them to confirm the model you identified. \
             Be friendly and professional, and ask one question at a time.",
            catalog_lines(devices)
        ),
    }
}

pub fn device_task(devices: &[DeviceModel]) -> TaskBrief {
    TaskBrief {
        description: format!(
            "Identify the user's device from their message.\n\n\
             Supported devices:\n{}\n\n\
             If the message names a supported model, restate it with its description \
             (for example: \"So you have an EH222 (Ice Cube Machine), is that correct?\") \
             and ask the user to briefly describe the problem.\n\
             If no supported model is named, show the list above and ask which one they have.",
            catalog_lines(devices)
        ),
        expected_output: "A short reply naming the identified device model, asking for confirmation \
                          and for a brief description of the problem"
            .into(),
    }
}

pub fn symptom_agent() -> AgentProfile {
    AgentProfile {
        role: "Symptom and Problem Specialist".into(),
        goal: "Gather detailed information about the device problem by asking one question at a time".into(),
        backstory: "You are a technical support specialist who gathers symptom information \
                    through short, structured questioning. You never ask more than one question \
                    per reply, and you briefly acknowledge each answer before asking the next one. \
                    Work through these topics in order, skipping any the user already answered:\n\
                    1. The specific symptoms or error indicators\n\
                    2. When the problem first appeared\n\
                    3. Actions that trigger it or make it better or worse\n\
                    4. Recent changes such as relocation, cleaning or repairs\n\
                    5. The sequence of events leading up to the problem\n\
                    6. Whether it is intermittent or constant\n\
                    7. Any other relevant details\n\
                    Be short, crisp and empathetic."
            .into(),
    }
}

/// Symptom task. With `structured`, the reply must be a JSON object carrying
/// an explicit completion flag.
pub fn symptom_task(structured: bool) -> TaskBrief {
    let mut description = String::from(
        "Continue gathering symptoms for the device below. Ask the next single question, \
         based on the conversation so far and the user's latest message. \
         When you have enough information to start troubleshooting, summarize the symptoms \
         instead of asking another question.",
    );
    let expected_output = if structured {
        description.push_str(
            "\n\nRespond with a JSON object of the form \
             {\"reply\": \"<your message to the user>\", \"symptoms_complete\": <true|false>}. \
             Set symptoms_complete to true only when you have gathered enough information \
             to start troubleshooting.",
        );
        "A JSON object with the fields reply and symptoms_complete"
    } else {
        "One short question for the user, or a symptom summary when enough information is gathered"
    };

    TaskBrief {
        description,
        expected_output: expected_output.into(),
    }
}

pub fn solver_agent() -> AgentProfile {
    AgentProfile {
        role: "Technical Problem Solver".into(),
        goal: "Guide the user through repair one step at a time, waiting for feedback after each step".into(),
        backstory: "You are an expert troubleshooter who works like a human support technician. \
                    You start with the easiest and safest action, explain it briefly with any precautions, \
                    and ask the user to try it and report back. You never list several steps or options, \
                    never repeat an action the user already tried, and suggest professional repair only \
                    when nothing else is left. You have access to a database of recorded device solutions."
            .into(),
    }
}

/// Solver task. `correction` is appended when a previous attempt was rejected.
pub fn solver_task(correction: Option<&str>) -> TaskBrief {
    let mut description = String::from(
        "Using the device information, the gathered symptoms and the troubleshooting history below, \
         propose the single next troubleshooting step.\n\n\
         Rules:\n\
         - Give exactly ONE action. Do not number it and do not offer alternatives.\n\
         - Choose the easiest and safest action that has not been tried yet.\n\
         - Never repeat a step from the troubleshooting history.\n\
         - Use the recorded solutions when they are relevant.\n\
         - End by asking the user to try it and report back whether it worked.",
    );
    if let Some(correction) = correction {
        description.push_str("\n\nIMPORTANT: ");
        description.push_str(correction);
    }

    TaskBrief {
        description,
        expected_output: "One actionable troubleshooting instruction with any precautions, \
                          ending with a request to report back"
            .into(),
    }
}
