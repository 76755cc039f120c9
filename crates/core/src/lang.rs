use serde::{Deserialize, Serialize};

/// The two course languages. Content files carry these as `"en"` / `"es"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Es,
}

impl Lang {
    /// BCP 47 tag handed to speech engines. Spanish uses the US variant
    /// to match the voices drivers actually hear at inspections.
    #[must_use]
    pub fn bcp47(self) -> &'static str {
        match self {
            Lang::En => "en-US",
            Lang::Es => "es-US",
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Es => "es",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_us_variants() {
        assert_eq!(Lang::En.bcp47(), "en-US");
        assert_eq!(Lang::Es.bcp47(), "es-US");
    }

    #[test]
    fn deserializes_lowercase_codes() {
        let lang: Lang = serde_json::from_str("\"es\"").unwrap();
        assert_eq!(lang, Lang::Es);
    }
}
