use serde::{Deserialize, Serialize};

use crate::Template;

/// Textual formats used to stage documents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    Yaml,
    Json,
    /// JSON without any insignificant whitespace, used for nested documents.
    MinifiedJson,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Yaml => "yaml",
            FileFormat::Json | FileFormat::MinifiedJson => "json",
        }
    }
}

pub fn format_content(template: &Template, format: FileFormat) -> crate::Result<String> {
    Ok(match format {
        FileFormat::Yaml => serde_yaml::to_string(template)?,
        FileFormat::Json => serde_json::to_string_pretty(template)?,
        FileFormat::MinifiedJson => serde_json::to_string(template)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Resource, intrinsic::reference};
    use serde_json::json;

    fn template() -> Template {
        let mut template = Template::new("formats");
        template
            .add_resource(
                "Role",
                Resource::new("AWS::IAM::Role", json!({"Path": "/parallelcluster/"})),
            )
            .unwrap();
        template
            .add_resource(
                "Profile",
                Resource::new("AWS::IAM::InstanceProfile", json!({"Roles": [reference("Role")]})),
            )
            .unwrap();
        template
    }

    #[test]
    fn minified_json() {
        insta::assert_snapshot!(format_content(&template(), FileFormat::MinifiedJson).unwrap(), @r###"{"AWSTemplateFormatVersion":"2010-09-09","Description":"formats","Resources":{"Profile":{"Type":"AWS::IAM::InstanceProfile","Properties":{"Roles":[{"Ref":"Role"}]}},"Role":{"Type":"AWS::IAM::Role","Properties":{"Path":"/parallelcluster/"}}}}"###);
    }

    #[test]
    fn yaml_round_trips() {
        let template = template();
        let text = format_content(&template, FileFormat::Yaml).unwrap();
        let parsed: Template = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn minified_is_smaller() {
        let template = template();
        assert!(
            format_content(&template, FileFormat::MinifiedJson).unwrap().len()
                < format_content(&template, FileFormat::Json).unwrap().len()
        );
    }
}
