use crate::workflows::onboarding::domain::ActorKind;

use super::ImportedContact;

/// Decides which workflow an imported contact goes through.
pub trait ContactClassifier: Send + Sync {
    fn classify(&self, contact: &ImportedContact) -> ActorKind;
}

impl<F> ContactClassifier for F
where
    F: Fn(&ImportedContact) -> ActorKind + Send + Sync,
{
    fn classify(&self, contact: &ImportedContact) -> ActorKind {
        self(contact)
    }
}

/// Uses the contact's `Tipo` column; anything unrecognised becomes a rider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HintClassifier;

impl ContactClassifier for HintClassifier {
    fn classify(&self, contact: &ImportedContact) -> ActorKind {
        contact
            .kind_hint
            .as_deref()
            .and_then(|hint| hint.parse().ok())
            .unwrap_or(ActorKind::Rider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(hint: Option<&str>) -> ImportedContact {
        ImportedContact {
            kind_hint: hint.map(str::to_string),
            ..ImportedContact::default()
        }
    }

    #[test]
    fn hint_classifier_defaults_to_rider() {
        assert_eq!(HintClassifier.classify(&contact(Some("Conductor"))), ActorKind::Driver);
        assert_eq!(HintClassifier.classify(&contact(Some("driver"))), ActorKind::Driver);
        assert_eq!(HintClassifier.classify(&contact(Some("cliente"))), ActorKind::Rider);
        assert_eq!(HintClassifier.classify(&contact(Some("vip"))), ActorKind::Rider);
        assert_eq!(HintClassifier.classify(&contact(None)), ActorKind::Rider);
    }

    #[test]
    fn closures_are_classifiers() {
        let everyone_drives = |_: &ImportedContact| ActorKind::Driver;
        assert_eq!(everyone_drives.classify(&contact(None)), ActorKind::Driver);
    }
}
