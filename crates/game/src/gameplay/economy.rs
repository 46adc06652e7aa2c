use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("currency amount must be positive")]
    InvalidAmount,
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },
}

/// Banked currency survives rounds and is the only thing that can be spent.
/// Session currency lives for one round and is merged in when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EconomyState {
    banked: u64,
    session: u64,
}

impl EconomyState {
    pub fn with_banked(banked: u64) -> Self {
        Self { banked, session: 0 }
    }

    pub fn banked(&self) -> u64 {
        self.banked
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn add_session_eggs(&mut self, amount: u64) -> Result<u64, EconomyError> {
        if amount == 0 {
            return Err(EconomyError::InvalidAmount);
        }
        self.session = self.session.saturating_add(amount);
        Ok(self.session)
    }

    pub fn add_banked(&mut self, amount: u64) -> Result<u64, EconomyError> {
        if amount == 0 {
            return Err(EconomyError::InvalidAmount);
        }
        self.banked = self.banked.saturating_add(amount);
        Ok(self.banked)
    }

    pub fn spend(&mut self, amount: u64) -> Result<u64, EconomyError> {
        if amount == 0 {
            return Err(EconomyError::InvalidAmount);
        }
        if self.banked < amount {
            return Err(EconomyError::InsufficientFunds {
                required: amount,
                available: self.banked,
            });
        }
        self.banked -= amount;
        Ok(self.banked)
    }

    /// Moves the session total into the bank and returns how much moved.
    pub fn bank_session(&mut self) -> u64 {
        let amount = std::mem::take(&mut self.session);
        self.banked = self.banked.saturating_add(amount);
        amount
    }

    pub fn reset_session(&mut self) {
        self.session = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overspending_fails_and_keeps_balance() {
        let mut economy = EconomyState::with_banked(100);
        assert_eq!(
            economy.spend(150),
            Err(EconomyError::InsufficientFunds {
                required: 150,
                available: 100
            })
        );
        assert_eq!(economy.banked(), 100);
    }

    #[test]
    fn zero_amounts_are_invalid() {
        let mut economy = EconomyState::with_banked(10);
        assert_eq!(economy.spend(0), Err(EconomyError::InvalidAmount));
        assert_eq!(economy.add_session_eggs(0), Err(EconomyError::InvalidAmount));
        assert_eq!(economy.add_banked(0), Err(EconomyError::InvalidAmount));
        assert_eq!(economy, EconomyState::with_banked(10));
    }

    #[test]
    fn banking_moves_session_into_bank() {
        let mut economy = EconomyState::with_banked(5);
        economy.add_session_eggs(30).expect("eggs");
        assert_eq!(economy.bank_session(), 30);
        assert_eq!(economy.banked(), 35);
        assert_eq!(economy.session(), 0);
        assert_eq!(economy.bank_session(), 0);
        assert_eq!(economy.banked(), 35);
    }

    #[test]
    fn spending_never_touches_session() {
        let mut economy = EconomyState::with_banked(20);
        economy.add_session_eggs(50).expect("eggs");
        assert!(economy.spend(30).is_err());
        economy.spend(20).expect("spend");
        assert_eq!(economy.session(), 50);
    }

    #[test]
    fn reset_session_discards_without_banking() {
        let mut economy = EconomyState::with_banked(1);
        economy.add_session_eggs(9).expect("eggs");
        economy.reset_session();
        assert_eq!(economy.session(), 0);
        assert_eq!(economy.banked(), 1);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Eggs(u64),
            Credit(u64),
            Spend(u64),
            Bank,
            Reset,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..500u64).prop_map(Op::Eggs),
                (0..500u64).prop_map(Op::Credit),
                (0..800u64).prop_map(Op::Spend),
                Just(Op::Bank),
                Just(Op::Reset),
            ]
        }

        proptest! {
            #[test]
            fn prop_failed_spend_leaves_state_unchanged(ops in prop::collection::vec(op(), 0..40)) {
                let mut economy = EconomyState::default();
                for op in ops {
                    match op {
                        Op::Eggs(amount) => { let _ = economy.add_session_eggs(amount); }
                        Op::Credit(amount) => { let _ = economy.add_banked(amount); }
                        Op::Spend(amount) => {
                            let before = economy.clone();
                            match economy.spend(amount) {
                                Ok(remaining) => {
                                    prop_assert_eq!(remaining, before.banked() - amount);
                                    prop_assert_eq!(economy.session(), before.session());
                                }
                                Err(_) => prop_assert_eq!(&economy, &before),
                            }
                        }
                        Op::Bank => { economy.bank_session(); }
                        Op::Reset => economy.reset_session(),
                    }
                }
            }

            #[test]
            fn prop_bank_then_reset_moves_exact_session(banked in 0..10_000u64, session in 0..10_000u64) {
                let mut economy = EconomyState::with_banked(banked);
                if session > 0 {
                    economy.add_session_eggs(session).expect("eggs");
                }
                economy.bank_session();
                economy.reset_session();
                prop_assert_eq!(economy.session(), 0);
                prop_assert_eq!(economy.banked(), banked + session);
            }
        }
    }
}
