use serde::{Deserialize, Serialize};

/// Declares a section struct whose fields are all optional, plus a `merge`
/// that overwrites whatever the patch sets.
macro_rules! style_section {
    ($(#[$meta:meta])* $name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            pub fn merge(mut self, patch: $name) -> $name {
                $(
                    if patch.$field.is_some() {
                        self.$field = patch.$field;
                    }
                )*
                self
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontFamily {
    Inter,
    Roboto,
    Lato,
    Merriweather,
    SourceSerif,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateFormat {
    /// 03/2024
    NumericMonthYear,
    /// Mar 2024
    ShortMonthYear,
    /// March 2024
    LongMonthYear,
    /// 2024
    YearOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListLayout {
    Bulleted,
    Compact,
    TwoColumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatePosition {
    Left,
    Right,
    BelowTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeadingStyle {
    Plain,
    Underlined,
    Boxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoShape {
    Circle,
    Square,
    Rounded,
}

style_section!(
    /// Document-wide typography and page options.
    AdvancedOptions {
        font_family: FontFamily,
        font_size: FontSize,
        date_format: DateFormat,
        heading_style: HeadingStyle,
        show_icons: bool,
    }
);

style_section!(CertificateStyle {
    layout: ListLayout,
    date_position: DatePosition,
    show_issuer: bool,
    show_date: bool,
});

style_section!(DeclarationStyle {
    alignment: Alignment,
    show_place: bool,
    show_date: bool,
    show_signature_line: bool,
});

style_section!(EducationStyle {
    layout: ListLayout,
    date_position: DatePosition,
    show_grade: bool,
    show_location: bool,
});

style_section!(ExperienceStyle {
    layout: ListLayout,
    date_position: DatePosition,
    show_location: bool,
    show_employment_type: bool,
});

style_section!(ProfileStyle {
    alignment: Alignment,
    photo_shape: PhotoShape,
    show_photo: bool,
    show_job_title: bool,
});

style_section!(FooterStyle {
    alignment: Alignment,
    show_page_numbers: bool,
    show_name: bool,
    show_email: bool,
});

/// Styling choices for one resume, keyed by section. Every section is
/// independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_options: Option<AdvancedOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<CertificateStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<DeclarationStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<EducationStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub professional_experience: Option<ExperienceStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<FooterStyle>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_serializes_empty() {
        assert_eq!(serde_json::to_value(ResumeMetadata::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_document_reads_section_keys() {
        let doc: ResumeMetadata = serde_json::from_value(json!({
            "advancedOptions": {"fontFamily": "sourceSerif", "showIcons": true},
            "professionalExperience": {"layout": "twoColumn"}
        }))
        .unwrap();
        let advanced = doc.advanced_options.unwrap();
        assert_eq!(advanced.font_family, Some(FontFamily::SourceSerif));
        assert_eq!(advanced.show_icons, Some(true));
        assert_eq!(
            doc.professional_experience.unwrap().layout,
            Some(ListLayout::TwoColumn)
        );
        assert!(doc.footer.is_none());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let current = FooterStyle {
            alignment: Some(Alignment::Center),
            show_page_numbers: Some(true),
            ..Default::default()
        };
        let merged = current.merge(FooterStyle {
            show_page_numbers: Some(false),
            ..Default::default()
        });
        assert_eq!(merged.alignment, Some(Alignment::Center));
        assert_eq!(merged.show_page_numbers, Some(false));
    }
}
