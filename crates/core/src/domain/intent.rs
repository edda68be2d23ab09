//! Closed intent taxonomy for the dialogue front end.
//!
//! The front end hands us an intent by name. Dispatching over a closed enum
//! (with an explicit `Unknown` arm) keeps "unhandled intent" visible at the
//! match site instead of being buried in string comparisons.

use std::collections::BTreeMap;

use serde::Deserialize;

pub const SLOT_FULL_NAME: &str = "VisitorFullName";
pub const SLOT_PHONE_NUMBER: &str = "VisitorPhoneNumber";
pub const SLOT_LAST_NAME: &str = "VisitorLastName";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    AboutTechnology,
    AboutDemo,
    InitiateDemo,
    DeleteMyInfo,
    Callback,
    Close,
    Fallback,
    Unknown(String),
}

impl Intent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "GreetingIntent" => Self::Greeting,
            "AboutTechnologyIntent" => Self::AboutTechnology,
            "AboutDemoIntent" => Self::AboutDemo,
            "InitiateDemo" => Self::InitiateDemo,
            "DeleteMyInfoIntent" => Self::DeleteMyInfo,
            "CallbackIntent" => Self::Callback,
            "CloseIntent" => Self::Close,
            "FallbackIntent" => Self::Fallback,
            other => Self::Unknown(other.to_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Greeting => "GreetingIntent",
            Self::AboutTechnology => "AboutTechnologyIntent",
            Self::AboutDemo => "AboutDemoIntent",
            Self::InitiateDemo => "InitiateDemo",
            Self::DeleteMyInfo => "DeleteMyInfoIntent",
            Self::Callback => "CallbackIntent",
            Self::Close => "CloseIntent",
            Self::Fallback => "FallbackIntent",
            Self::Unknown(name) => name,
        }
    }
}

/// Wire shape of a single slot: `{"value": {"interpretedValue": "..."}}`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Slot {
    #[serde(default)]
    pub value: Option<SlotValue>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SlotValue {
    #[serde(rename = "interpretedValue", default)]
    pub interpreted_value: Option<String>,
}

/// Named slots attached to the recognized intent. Slots may be present but
/// empty, so lookups flatten both levels of optionality.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SlotValues(pub BTreeMap<String, Option<Slot>>);

impl SlotValues {
    pub fn interpreted(&self, slot_name: &str) -> Option<&str> {
        self.0
            .get(slot_name)
            .and_then(|slot| slot.as_ref())
            .and_then(|slot| slot.value.as_ref())
            .and_then(|value| value.interpreted_value.as_deref())
            .filter(|value| !value.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, Slot, SlotValue, SlotValues};

    #[test]
    fn intent_names_round_trip_through_the_taxonomy() {
        for name in [
            "GreetingIntent",
            "AboutTechnologyIntent",
            "AboutDemoIntent",
            "InitiateDemo",
            "DeleteMyInfoIntent",
            "CallbackIntent",
            "CloseIntent",
            "FallbackIntent",
        ] {
            assert_eq!(Intent::from_name(name).name(), name);
        }
    }

    #[test]
    fn unrecognized_names_land_in_the_unknown_arm() {
        let intent = Intent::from_name("BuyNowIntent");
        assert_eq!(intent, Intent::Unknown("BuyNowIntent".to_owned()));
        assert_eq!(intent.name(), "BuyNowIntent");
    }

    #[test]
    fn interpreted_lookup_flattens_missing_levels() {
        let mut slots = SlotValues::default();
        slots.0.insert("Empty".to_owned(), None);
        slots.0.insert("NoValue".to_owned(), Some(Slot { value: None }));
        slots.0.insert(
            "Filled".to_owned(),
            Some(Slot {
                value: Some(SlotValue { interpreted_value: Some("hello".to_owned()) }),
            }),
        );

        assert_eq!(slots.interpreted("Empty"), None);
        assert_eq!(slots.interpreted("NoValue"), None);
        assert_eq!(slots.interpreted("Missing"), None);
        assert_eq!(slots.interpreted("Filled"), Some("hello"));
    }

    #[test]
    fn blank_interpreted_values_count_as_absent() {
        let mut slots = SlotValues::default();
        slots.0.insert(
            "Blank".to_owned(),
            Some(Slot { value: Some(SlotValue { interpreted_value: Some("  ".to_owned()) }) }),
        );
        assert_eq!(slots.interpreted("Blank"), None);
    }
}
