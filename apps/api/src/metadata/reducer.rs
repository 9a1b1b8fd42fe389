use serde::{Deserialize, Serialize};

use super::document::{
    AdvancedOptions, CertificateStyle, DeclarationStyle, EducationStyle, ExperienceStyle,
    FooterStyle, ProfileStyle, ResumeMetadata,
};

/// A change to exactly one section. On the wire:
/// `{"section": "footer", "patch": {"showPageNumbers": true}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "section", content = "patch", rename_all = "camelCase")]
pub enum SectionPatch {
    AdvancedOptions(AdvancedOptions),
    Certificates(CertificateStyle),
    Declaration(DeclarationStyle),
    Education(EducationStyle),
    ProfessionalExperience(ExperienceStyle),
    Profile(ProfileStyle),
    Footer(FooterStyle),
}

impl SectionPatch {
    pub fn section(&self) -> &'static str {
        match self {
            SectionPatch::AdvancedOptions(_) => "advancedOptions",
            SectionPatch::Certificates(_) => "certificates",
            SectionPatch::Declaration(_) => "declaration",
            SectionPatch::Education(_) => "education",
            SectionPatch::ProfessionalExperience(_) => "professionalExperience",
            SectionPatch::Profile(_) => "profile",
            SectionPatch::Footer(_) => "footer",
        }
    }
}

fn merge_into<T: Default>(slot: &mut Option<T>, patch: T, merge: fn(T, T) -> T) {
    let current = slot.take().unwrap_or_default();
    *slot = Some(merge(current, patch));
}

/// Returns the document with `patch` merged into its section. Other
/// sections are untouched; a missing section starts from its defaults.
pub fn apply(mut document: ResumeMetadata, patch: SectionPatch) -> ResumeMetadata {
    match patch {
        SectionPatch::AdvancedOptions(p) => {
            merge_into(&mut document.advanced_options, p, AdvancedOptions::merge)
        }
        SectionPatch::Certificates(p) => {
            merge_into(&mut document.certificates, p, CertificateStyle::merge)
        }
        SectionPatch::Declaration(p) => {
            merge_into(&mut document.declaration, p, DeclarationStyle::merge)
        }
        SectionPatch::Education(p) => merge_into(&mut document.education, p, EducationStyle::merge),
        SectionPatch::ProfessionalExperience(p) => merge_into(
            &mut document.professional_experience,
            p,
            ExperienceStyle::merge,
        ),
        SectionPatch::Profile(p) => merge_into(&mut document.profile, p, ProfileStyle::merge),
        SectionPatch::Footer(p) => merge_into(&mut document.footer, p, FooterStyle::merge),
    }
    document
}
