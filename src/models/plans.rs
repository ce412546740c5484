use serde::{Deserialize, Serialize};

/// Static subscription catalog. Allowances are per calendar month;
/// `monthly_limit() == None` means unlimited.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Plan {
    Free,
    Basic,
    Pro,
    Unlimited,
}

impl Plan {
    pub fn from_id(id: &str) -> Plan {
        match id.to_ascii_uppercase().as_str() {
            "BASIC" => Plan::Basic,
            "PRO" => Plan::Pro,
            "UNLIMITED" => Plan::Unlimited,
            _ => Plan::Free,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Basic => "BASIC",
            Plan::Pro => "PRO",
            Plan::Unlimited => "UNLIMITED",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Plan::Free => "Plano Gratuito",
            Plan::Basic => "Plano Básico",
            Plan::Pro => "Plano Profissional",
            Plan::Unlimited => "Plano Ilimitado",
        }
    }

    pub fn monthly_limit(&self) -> Option<i64> {
        match self {
            Plan::Free => Some(5),
            Plan::Basic => Some(50),
            Plan::Pro => Some(200),
            Plan::Unlimited => None,
        }
    }

    pub fn price_in_cents(&self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Basic => 1990,
            Plan::Pro => 3990,
            Plan::Unlimited => 7990,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_fall_back_to_free() {
        assert_eq!(Plan::from_id("FREE"), Plan::Free);
        assert_eq!(Plan::from_id("pro"), Plan::Pro);
        assert_eq!(Plan::from_id("whatever"), Plan::Free);
    }

    #[test]
    fn only_unlimited_has_no_cap() {
        assert_eq!(Plan::Free.monthly_limit(), Some(5));
        assert_eq!(Plan::Basic.monthly_limit(), Some(50));
        assert_eq!(Plan::Pro.monthly_limit(), Some(200));
        assert_eq!(Plan::Unlimited.monthly_limit(), None);
    }
}
