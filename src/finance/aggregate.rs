//! Derived-total recomputation for finance records.
//!
//! Every write path re-derives the totals from the embedded line items before
//! the row is persisted, so a read immediately after a write always observes
//! consistent numbers.

use time::OffsetDateTime;

use crate::finance::dto::{Expense, FinancePlan};

/// Record-level derived fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub total_spent: f64,
    pub total_saved: f64,
    pub remaining_budget: f64,
}

/// Re-establish every derived field from the embedded data.
///
/// Order-independent pure summation, no clamping: a plan saved past its goal
/// goes negative on `remaining_amount`. Each plan's `updated_at` is refreshed
/// as part of the same recomputation so it lands in the same write.
pub fn recompute(expenses: &[Expense], plans: &mut [FinancePlan], now: OffsetDateTime) -> Totals {
    let total_spent: f64 = expenses.iter().map(|e| e.amount).sum();

    let mut total_saved = 0.0;
    for plan in plans.iter_mut() {
        plan.total_saved = plan.savings.iter().map(|s| s.amount).sum();
        plan.remaining_amount = plan.goal_amount - plan.total_saved;
        plan.updated_at = now;
        total_saved += plan.total_saved;
    }

    Totals {
        total_spent,
        total_saved,
        remaining_budget: total_saved - total_spent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::dto::SavingsTransaction;
    use rand::Rng;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    fn expense(amount: f64) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            date: date!(2024 - 01 - 15),
            description: "x".into(),
            amount,
            category: None,
        }
    }

    fn plan(goal: f64, amounts: &[f64]) -> FinancePlan {
        let t0 = datetime!(2024-01-01 00:00 UTC);
        FinancePlan {
            id: Uuid::new_v4(),
            name: "plan".into(),
            goal_amount: goal,
            savings: amounts
                .iter()
                .map(|&amount| SavingsTransaction {
                    id: Uuid::new_v4(),
                    date: date!(2024 - 01 - 10),
                    amount,
                    note: None,
                })
                .collect(),
            total_saved: 0.0,
            remaining_amount: 0.0,
            created_at: t0,
            updated_at: t0,
        }
    }

    #[test]
    fn empty_record_is_all_zero() {
        let totals = recompute(&[], &mut [], datetime!(2024-06-01 00:00 UTC));
        assert_eq!(totals.total_spent, 0.0);
        assert_eq!(totals.total_saved, 0.0);
        assert_eq!(totals.remaining_budget, 0.0);
    }

    #[test]
    fn totals_follow_line_items() {
        let expenses = vec![expense(10.0), expense(25.5)];
        let mut plans = vec![plan(100.0, &[40.0, 10.0]), plan(20.0, &[30.0])];

        let now = datetime!(2024-06-01 12:00 UTC);
        let totals = recompute(&expenses, &mut plans, now);

        assert_eq!(totals.total_spent, 35.5);
        assert_eq!(totals.total_saved, 80.0);
        assert_eq!(totals.remaining_budget, 80.0 - 35.5);

        assert_eq!(plans[0].total_saved, 50.0);
        assert_eq!(plans[0].remaining_amount, 50.0);
        // Overshooting the goal goes negative, no clamping.
        assert_eq!(plans[1].total_saved, 30.0);
        assert_eq!(plans[1].remaining_amount, -10.0);

        for p in &plans {
            assert_eq!(p.updated_at, now);
        }
    }

    #[test]
    fn invariant_holds_for_randomized_records() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let expenses: Vec<Expense> = (0..rng.gen_range(0..20))
                .map(|_| expense(rng.gen_range(0.0..500.0)))
                .collect();
            let mut plans: Vec<FinancePlan> = (0..rng.gen_range(0..10))
                .map(|_| {
                    let amounts: Vec<f64> = (0..rng.gen_range(0..15))
                        .map(|_| rng.gen_range(0.0..200.0))
                        .collect();
                    plan(rng.gen_range(0.0..1000.0), &amounts)
                })
                .collect();

            let totals = recompute(&expenses, &mut plans, datetime!(2024-06-01 00:00 UTC));

            let spent: f64 = expenses.iter().map(|e| e.amount).sum();
            let saved: f64 = plans
                .iter()
                .map(|p| p.savings.iter().map(|s| s.amount).sum::<f64>())
                .sum();
            assert_eq!(totals.total_spent, spent);
            assert_eq!(totals.total_saved, saved);
            assert_eq!(totals.remaining_budget, totals.total_saved - totals.total_spent);
            for p in &plans {
                assert_eq!(p.total_saved, p.savings.iter().map(|s| s.amount).sum::<f64>());
                assert_eq!(p.remaining_amount, p.goal_amount - p.total_saved);
            }
        }
    }
}
