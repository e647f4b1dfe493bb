//! Built-in reference data: compliance frameworks and training modules.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::{ComplianceFramework, ComplianceRequirement, TrainingLevel, TrainingModule};

const FRAMEWORKS: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "GDPR",
        "General Data Protection Regulation",
        &[
            ("Data Protection Policy", "Create and implement a data protection policy for your organization."),
            ("Privacy Notices", "Provide clear privacy notices to data subjects about how their data is processed."),
            ("Data Processing Register", "Maintain a register of all data processing activities within your organization."),
            ("Data Subject Rights", "Implement procedures to handle data subject rights requests (access, erasure, etc.)."),
            ("Data Breach Procedures", "Establish procedures for detecting, reporting, and investigating data breaches."),
        ],
    ),
    (
        "CCPA",
        "California Consumer Privacy Act",
        &[
            ("Privacy Policy Update", "Update privacy policy to include CCPA-specific disclosures."),
            ("Consumer Rights Procedures", "Implement procedures for handling consumer rights requests."),
            ("Data Inventory", "Create an inventory of personal information collected in the last 12 months."),
            ("Opt-Out Mechanism", "Implement a 'Do Not Sell My Personal Information' option if applicable."),
        ],
    ),
    (
        "HIPAA",
        "Health Insurance Portability and Accountability Act",
        &[
            ("Privacy Officer", "Designate a privacy officer responsible for HIPAA compliance."),
            ("Risk Assessment", "Conduct a risk assessment of potential vulnerabilities to PHI."),
            ("Security Measures", "Implement appropriate security measures to protect PHI."),
            ("Business Associate Agreements", "Ensure all business associates have signed BAAs."),
            ("Training Program", "Develop and implement a HIPAA training program for all staff."),
        ],
    ),
];

pub(super) fn frameworks() -> Vec<ComplianceFramework> {
    FRAMEWORKS
        .iter()
        .map(|(name, description, requirements)| {
            let framework_id = Uuid::new_v4();
            ComplianceFramework {
                id: framework_id,
                name: name.to_string(),
                description: description.to_string(),
                requirements: requirements
                    .iter()
                    .map(|(name, description)| ComplianceRequirement {
                        id: Uuid::new_v4(),
                        framework_id,
                        name: name.to_string(),
                        description: description.to_string(),
                    })
                    .collect(),
            }
        })
        .collect()
}

const MODULES: &[(&str, &str, u32, TrainingLevel, &[&str])] = &[
    ("Phishing Awareness", "Learn to identify and avoid phishing attempts.", 30, TrainingLevel::Beginner, &["email", "phishing"]),
    ("Password Security", "Best practices for creating and managing secure passwords.", 20, TrainingLevel::Beginner, &["passwords", "mfa"]),
    ("Data Protection Basics", "Understanding how to protect sensitive data.", 45, TrainingLevel::Intermediate, &["data", "privacy"]),
    ("Mobile Device Security", "Securing smartphones and tablets in the workplace.", 25, TrainingLevel::Beginner, &["mobile", "devices"]),
    ("Social Engineering Defense", "Recognizing and preventing social engineering attacks.", 40, TrainingLevel::Intermediate, &["social engineering"]),
    ("Secure Remote Work", "Security best practices for working remotely.", 35, TrainingLevel::Beginner, &["remote", "vpn"]),
];

pub(super) fn training_modules() -> Vec<TrainingModule> {
    let base = Utc::now();
    MODULES
        .iter()
        .enumerate()
        .map(|(i, (title, description, minutes, level, topics))| TrainingModule {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            content: description.to_string(),
            duration_minutes: *minutes,
            level: *level,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            // distinct timestamps keep "newest first" stable
            created_at: base - Duration::seconds(i as i64),
        })
        .collect()
}
