use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Decimal places kept for displayed meal rates
const RATE_DP: u32 = 4;

/// Round a monetary amount to cents, halves away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Cost of one meal: approved shopping divided by all meals eaten.
///
/// Zero when nothing was eaten, so an idle period never divides by zero.
pub fn meal_rate(total_shopping: Decimal, total_meals: i64) -> Decimal {
    if total_meals <= 0 {
        return Decimal::ZERO;
    }
    total_shopping / Decimal::from(total_meals)
}

/// Everything one participant did during a period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberActivity {
    pub user_id: Uuid,
    pub name: String,
    /// Own meals
    pub meals: i64,
    /// Guest meals hosted (billed to this member)
    pub guest_meals: i64,
    pub paid: Decimal,
    /// Signed ledger total: adjustments, carry-forwards and refunds
    pub adjustments: Decimal,
    /// Refunds only (negative); money that left the fund
    pub refunds: Decimal,
}

/// Aggregated period figures fed into [`PeriodSummary::compute`]
#[derive(Debug, Clone, Default)]
pub struct PeriodInputs {
    pub opening_balance: Decimal,
    pub total_shopping: Decimal,
    pub total_extra: Decimal,
    participants: HashMap<Uuid, MemberActivity>,
}

impl PeriodInputs {
    pub fn new(opening_balance: Decimal, total_shopping: Decimal, total_extra: Decimal) -> Self {
        Self {
            opening_balance,
            total_shopping,
            total_extra,
            participants: HashMap::new(),
        }
    }

    fn entry(&mut self, user_id: Uuid, name: &str) -> &mut MemberActivity {
        let entry = self
            .participants
            .entry(user_id)
            .or_insert_with(|| MemberActivity {
                user_id,
                ..Default::default()
            });
        if entry.name.is_empty() {
            entry.name = name.to_string();
        }
        entry
    }

    /// Register a participant even without activity (current members)
    pub fn add_member(&mut self, user_id: Uuid, name: &str) -> &mut Self {
        self.entry(user_id, name);
        self
    }

    pub fn add_meals(&mut self, user_id: Uuid, name: &str, meals: i64) -> &mut Self {
        self.entry(user_id, name).meals += meals;
        self
    }

    pub fn add_guest_meals(&mut self, user_id: Uuid, name: &str, meals: i64) -> &mut Self {
        self.entry(user_id, name).guest_meals += meals;
        self
    }

    pub fn add_payment(&mut self, user_id: Uuid, name: &str, amount: Decimal) -> &mut Self {
        self.entry(user_id, name).paid += amount;
        self
    }

    /// Record a ledger entry; negative `refund` amounts also leave the fund
    pub fn add_transaction(
        &mut self,
        user_id: Uuid,
        name: &str,
        amount: Decimal,
        is_refund: bool,
    ) -> &mut Self {
        let entry = self.entry(user_id, name);
        entry.adjustments += amount;
        if is_refund {
            entry.refunds += amount;
        }
        self
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}

/// Per-member line of a period summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub user_id: Uuid,
    pub name: String,
    pub meals: i64,
    pub guest_meals: i64,
    pub total_meals: i64,
    pub meal_cost: Decimal,
    pub extra_share: Decimal,
    pub paid: Decimal,
    pub adjustments: Decimal,
    /// paid + adjustments - meal_cost - extra_share; negative means the member owes
    pub balance: Decimal,
}

/// Totals and member lines for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub total_meals: i64,
    pub total_shopping: Decimal,
    pub total_extra: Decimal,
    pub total_paid: Decimal,
    pub total_adjustments: Decimal,
    pub meal_rate: Decimal,
    pub extra_share: Decimal,
    pub opening_balance: Decimal,
    /// Money the room should be holding right now
    pub cash_in_hand: Decimal,
    pub members: Vec<MemberSummary>,
}

impl PeriodSummary {
    pub fn compute(inputs: &PeriodInputs) -> Self {
        let participants: Vec<&MemberActivity> = inputs.participants.values().collect();

        let total_meals: i64 = participants.iter().map(|m| m.meals + m.guest_meals).sum();
        let total_paid: Decimal = participants.iter().map(|m| m.paid).sum();
        let total_adjustments: Decimal = participants.iter().map(|m| m.adjustments).sum();
        let total_refunds: Decimal = participants.iter().map(|m| m.refunds).sum();

        let rate = meal_rate(inputs.total_shopping, total_meals);
        let extra_share = if participants.is_empty() {
            Decimal::ZERO
        } else {
            round_money(inputs.total_extra / Decimal::from(participants.len() as u64))
        };

        let mut members: Vec<MemberSummary> = participants
            .iter()
            .map(|m| {
                let member_meals = m.meals + m.guest_meals;
                let meal_cost = round_money(rate * Decimal::from(member_meals));
                let paid = round_money(m.paid);
                let adjustments = round_money(m.adjustments);
                MemberSummary {
                    user_id: m.user_id,
                    name: m.name.clone(),
                    meals: m.meals,
                    guest_meals: m.guest_meals,
                    total_meals: member_meals,
                    meal_cost,
                    extra_share,
                    paid,
                    adjustments,
                    balance: paid + adjustments - meal_cost - extra_share,
                }
            })
            .collect();

        members.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.user_id.cmp(&b.user_id))
        });

        let cash_in_hand = round_money(
            inputs.opening_balance + total_paid + total_refunds
                - inputs.total_shopping
                - inputs.total_extra,
        );

        Self {
            total_meals,
            total_shopping: round_money(inputs.total_shopping),
            total_extra: round_money(inputs.total_extra),
            total_paid: round_money(total_paid),
            total_adjustments: round_money(total_adjustments),
            meal_rate: rate.round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointAwayFromZero),
            extra_share,
            opening_balance: round_money(inputs.opening_balance),
            cash_in_hand,
            members,
        }
    }

    /// Closing balance for one member, if they took part
    pub fn balance_of(&self, user_id: Uuid) -> Option<Decimal> {
        self.members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_meal_rate_zero_meals() {
        assert_eq!(meal_rate(dec("500"), 0), Decimal::ZERO);
        assert_eq!(meal_rate(dec("500"), -3), Decimal::ZERO);
    }

    #[test]
    fn test_meal_rate_simple() {
        assert_eq!(meal_rate(dec("300"), 60), dec("5"));
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
    }

    #[test]
    fn test_two_member_period() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut inputs = PeriodInputs::new(Decimal::ZERO, dec("600"), dec("200"));
        inputs
            .add_meals(alice, "Alice", 40)
            .add_meals(bob, "Bob", 18)
            .add_guest_meals(bob, "Bob", 2)
            .add_payment(alice, "Alice", dec("500"))
            .add_payment(bob, "Bob", dec("250"));

        let summary = PeriodSummary::compute(&inputs);

        assert_eq!(summary.total_meals, 60);
        assert_eq!(summary.meal_rate, dec("10"));
        assert_eq!(summary.extra_share, dec("100"));

        let a = &summary.members[0];
        assert_eq!(a.name, "Alice");
        assert_eq!(a.meal_cost, dec("400"));
        assert_eq!(a.balance, dec("0")); // 500 - 400 - 100

        let b = &summary.members[1];
        assert_eq!(b.total_meals, 20);
        assert_eq!(b.meal_cost, dec("200"));
        assert_eq!(b.balance, dec("-50")); // 250 - 200 - 100

        // 750 paid - 600 shopping - 200 extra
        assert_eq!(summary.cash_in_hand, dec("-50"));
    }

    #[test]
    fn test_balance_identity_holds_for_every_member() {
        let mut inputs = PeriodInputs::new(dec("100"), dec("1234.56"), dec("99.99"));
        for (i, name) in ["Cara", "Dev", "Eli"].iter().enumerate() {
            let id = Uuid::new_v4();
            inputs
                .add_meals(id, name, 10 + i as i64 * 7)
                .add_payment(id, name, dec("300.10"));
        }

        let summary = PeriodSummary::compute(&inputs);
        for m in &summary.members {
            assert_eq!(m.balance, m.paid + m.adjustments - m.meal_cost - m.extra_share);
        }

        // Member meal costs add back up to total shopping within rounding
        let billed: Decimal = summary.members.iter().map(|m| m.meal_cost).sum();
        assert!((billed - summary.total_shopping).abs() <= dec("0.03"));
    }

    #[test]
    fn test_idle_member_still_shares_extra_costs() {
        let cook = Uuid::new_v4();
        let away = Uuid::new_v4();

        let mut inputs = PeriodInputs::new(Decimal::ZERO, dec("100"), dec("50"));
        inputs.add_meals(cook, "Cook", 10).add_member(away, "Away");

        let summary = PeriodSummary::compute(&inputs);
        let away_line = summary.members.iter().find(|m| m.user_id == away).unwrap();
        assert_eq!(away_line.meal_cost, Decimal::ZERO);
        assert_eq!(away_line.extra_share, dec("25"));
        assert_eq!(summary.balance_of(away), Some(dec("-25")));
    }

    #[test]
    fn test_no_participants() {
        let inputs = PeriodInputs::new(dec("10"), Decimal::ZERO, dec("40"));
        let summary = PeriodSummary::compute(&inputs);
        assert!(summary.members.is_empty());
        assert_eq!(summary.extra_share, Decimal::ZERO);
        assert_eq!(summary.cash_in_hand, dec("-30"));
    }

    #[test]
    fn test_refund_reduces_balance_and_cash() {
        let id = Uuid::new_v4();
        let mut inputs = PeriodInputs::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        inputs
            .add_payment(id, "Fay", dec("100"))
            .add_transaction(id, "Fay", dec("-40"), true)
            .add_transaction(id, "Fay", dec("15"), false);

        let summary = PeriodSummary::compute(&inputs);
        assert_eq!(summary.balance_of(id), Some(dec("75")));
        assert_eq!(summary.total_adjustments, dec("-25"));
        // adjustments do not move cash, refunds do
        assert_eq!(summary.cash_in_hand, dec("60"));
    }

    #[test]
    fn test_members_sorted_by_name_case_insensitive() {
        let mut inputs = PeriodInputs::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        inputs
            .add_member(Uuid::new_v4(), "zed")
            .add_member(Uuid::new_v4(), "Amy")
            .add_member(Uuid::new_v4(), "bob");
        let names: Vec<String> = PeriodSummary::compute(&inputs)
            .members
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Amy", "bob", "zed"]);
    }

    #[test]
    fn test_late_name_fills_in() {
        let id = Uuid::new_v4();
        let mut inputs = PeriodInputs::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        inputs.add_meals(id, "", 2).add_member(id, "Gus");
        assert_eq!(inputs.participant_count(), 1);
        assert_eq!(PeriodSummary::compute(&inputs).members[0].name, "Gus");
    }
}
