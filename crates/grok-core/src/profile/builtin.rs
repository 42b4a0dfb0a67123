//! Profiles that ship with the engine.

use crate::models::profile::{
    ModelConfig, OutputFormat, OutputSchema, ProcessingProfile, ProcessingStep, ProfileMetadata,
    ProviderKind, SchemaType,
};

const BUILTIN_AUTHOR: &str = "Grok Intelligence Engine";
const BUILTIN_CREATED_AT: &str = "2025-09-15T23:30:00Z";
const LOCAL_MODEL: &str = "llama3.1:8b";

struct StepSpec<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    template: &'a str,
    provider: ProviderKind,
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    required_fields: &'a [&'a str],
    dependencies: &'a [&'a str],
}

fn json_step(spec: StepSpec<'_>) -> ProcessingStep {
    ProcessingStep {
        step_id: spec.id.to_string(),
        name: spec.name.to_string(),
        description: Some(spec.description.to_string()),
        prompt_template: spec.template.to_string(),
        model_config: ModelConfig {
            provider: spec.provider,
            model: spec.model.to_string(),
            temperature: spec.temperature,
            max_tokens: spec.max_tokens,
            ..ModelConfig::default()
        },
        output_format: OutputFormat::Json,
        output_schema: Some(OutputSchema {
            schema_type: SchemaType::Object,
            required_fields: spec.required_fields.iter().map(|s| s.to_string()).collect(),
        }),
        required: true,
        pass_to_next: true,
        include_in_output: None,
        dependencies: spec.dependencies.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_metadata() -> ProfileMetadata {
    ProfileMetadata {
        author: Some(BUILTIN_AUTHOR.to_string()),
        source: Some("builtin".to_string()),
        created_at: Some(BUILTIN_CREATED_AT.to_string()),
        updated_at: None,
    }
}

fn strings<C: FromIterator<String>>(items: &[&str]) -> C {
    items.iter().map(|s| s.to_string()).collect()
}

/// All built-in profiles, keyed by their `profile_id`.
pub fn builtin_profiles() -> Vec<ProcessingProfile> {
    vec![business_meeting(), project_planning(), personal_notes()]
}

fn business_meeting() -> ProcessingProfile {
    ProcessingProfile {
        profile_id: "business_meeting".to_string(),
        name: "Business Meeting Analysis".to_string(),
        description: "Extract entities, decisions, and action items from business meetings"
            .to_string(),
        version: "1.0.0".to_string(),
        steps: vec![
            json_step(StepSpec {
                id: "extract_entities",
                name: "Extract Key Entities",
                description: "Identify people, companies, dates, and locations mentioned",
                template: "Extract key entities from this meeting transcript:\n\n\
                    {transcript}\n\n\
                    Return JSON with:\n\
                    - people: list of person names mentioned\n\
                    - companies: list of company/organization names\n\
                    - dates: list of dates mentioned\n\
                    - locations: list of locations mentioned\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Local,
                model: LOCAL_MODEL,
                temperature: 0.1,
                max_tokens: 1000,
                required_fields: &["people", "companies", "dates", "locations"],
                dependencies: &[],
            }),
            json_step(StepSpec {
                id: "analyze_decisions",
                name: "Analyze Decisions Made",
                description: "Identify decisions made and action items assigned",
                template: "Based on this transcript and the entities extracted, analyze the decisions made:\n\n\
                    Transcript: {transcript}\n\
                    Entities: {extract_entities}\n\n\
                    Identify decisions made in the meeting. Return JSON with:\n\
                    - decisions: list of decisions with responsible person and deadline\n\
                    - action_items: concrete next steps identified\n\
                    - key_topics: main topics discussed\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Local,
                model: LOCAL_MODEL,
                temperature: 0.2,
                max_tokens: 1500,
                required_fields: &["decisions", "action_items", "key_topics"],
                dependencies: &["extract_entities"],
            }),
        ],
        final_output_schema: None,
        tags: strings(&["business", "meetings", "decisions"]),
        use_cases: strings(&["Team meetings", "Project planning", "Client calls"]),
        estimated_tokens: 4000,
        metadata: builtin_metadata(),
    }
}

fn project_planning() -> ProcessingProfile {
    ProcessingProfile {
        profile_id: "project_planning".to_string(),
        name: "Project Planning Session".to_string(),
        description:
            "Analyze project planning discussions for requirements, timelines, and risks"
                .to_string(),
        version: "1.0.0".to_string(),
        steps: vec![
            json_step(StepSpec {
                id: "extract_requirements",
                name: "Extract Requirements",
                description: "Identify project requirements and specifications",
                template: "Extract project requirements from this planning session:\n\n\
                    {transcript}\n\n\
                    Return JSON with:\n\
                    - functional_requirements: list of functional requirements\n\
                    - non_functional_requirements: list of performance/quality requirements\n\
                    - constraints: list of constraints and limitations\n\
                    - stakeholders: list of stakeholders mentioned\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Local,
                model: LOCAL_MODEL,
                temperature: 0.1,
                max_tokens: 1500,
                required_fields: &[
                    "functional_requirements",
                    "non_functional_requirements",
                    "constraints",
                    "stakeholders",
                ],
                dependencies: &[],
            }),
            json_step(StepSpec {
                id: "analyze_timeline",
                name: "Analyze Timeline",
                description: "Extract timeline information and milestones",
                template: "Based on the requirements and transcript, analyze the project timeline:\n\n\
                    Transcript: {transcript}\n\
                    Requirements: {extract_requirements}\n\n\
                    Extract timeline information. Return JSON with:\n\
                    - milestones: list of key milestones with dates\n\
                    - phases: project phases identified\n\
                    - deadlines: important deadlines mentioned\n\
                    - dependencies: task dependencies identified\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Local,
                model: LOCAL_MODEL,
                temperature: 0.2,
                max_tokens: 1500,
                required_fields: &["milestones", "phases", "deadlines", "dependencies"],
                dependencies: &["extract_requirements"],
            }),
            json_step(StepSpec {
                id: "assess_risks",
                name: "Risk Assessment",
                description: "Identify project risks and mitigation strategies",
                template: "Analyze risks for this project based on the discussion:\n\n\
                    Transcript: {transcript}\n\
                    Requirements: {extract_requirements}\n\
                    Timeline: {analyze_timeline}\n\n\
                    Identify risks and mitigation strategies. Return JSON with:\n\
                    - risks: list of identified risks with severity\n\
                    - mitigation_strategies: proposed risk mitigation approaches\n\
                    - assumptions: key assumptions made\n\
                    - success_factors: critical success factors\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Remote,
                model: "openai/gpt-4o-mini",
                temperature: 0.3,
                max_tokens: 2000,
                required_fields: &[
                    "risks",
                    "mitigation_strategies",
                    "assumptions",
                    "success_factors",
                ],
                dependencies: &["extract_requirements", "analyze_timeline"],
            }),
        ],
        final_output_schema: None,
        tags: strings(&["project", "planning", "requirements", "risk"]),
        use_cases: strings(&["Project kickoffs", "Planning sessions", "Requirement reviews"]),
        estimated_tokens: 6000,
        metadata: builtin_metadata(),
    }
}

fn personal_notes() -> ProcessingProfile {
    ProcessingProfile {
        profile_id: "personal_notes".to_string(),
        name: "Personal Notes Analysis".to_string(),
        description: "Process personal notes and ideas for organization".to_string(),
        version: "1.0.0".to_string(),
        steps: vec![
            json_step(StepSpec {
                id: "extract_ideas",
                name: "Extract Ideas",
                description: "Identify main ideas and concepts",
                template: "Analyze these personal notes and extract key ideas:\n\n\
                    {transcript}\n\n\
                    Return JSON with:\n\
                    - main_ideas: list of key ideas and concepts\n\
                    - insights: important insights or realizations\n\
                    - questions: questions raised or topics to explore\n\
                    - connections: connections to other topics or ideas\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Local,
                model: LOCAL_MODEL,
                temperature: 0.3,
                max_tokens: 1200,
                required_fields: &["main_ideas", "insights", "questions", "connections"],
                dependencies: &[],
            }),
            json_step(StepSpec {
                id: "organize_content",
                name: "Organize Content",
                description: "Organize and categorize the content",
                template: "Based on the ideas extracted, organize and categorize this content:\n\n\
                    Original notes: {transcript}\n\
                    Extracted ideas: {extract_ideas}\n\n\
                    Organize the content. Return JSON with:\n\
                    - categories: content organized by category\n\
                    - action_items: actionable tasks identified\n\
                    - topics: main topics covered\n\
                    - priority: high/medium/low priority items\n\n\
                    Format your response as valid JSON only.",
                provider: ProviderKind::Local,
                model: LOCAL_MODEL,
                temperature: 0.2,
                max_tokens: 1500,
                required_fields: &["categories", "action_items", "topics", "priority"],
                dependencies: &["extract_ideas"],
            }),
        ],
        final_output_schema: None,
        tags: strings(&["personal", "notes", "ideas", "organization"]),
        use_cases: strings(&[
            "Personal brainstorming",
            "Note organization",
            "Idea development",
        ]),
        estimated_tokens: 3500,
        metadata: builtin_metadata(),
    }
}
