use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmortizationYear {
    pub year: u32,
    pub balance: f64,
    pub interest_paid: f64,
    pub principal_paid: f64,
}

impl AmortizationYear {
    fn settled(year: u32) -> Self {
        Self {
            year,
            balance: 0.0,
            interest_paid: 0.0,
            principal_paid: 0.0,
        }
    }

    pub fn payment(&self) -> f64 {
        self.interest_paid + self.principal_paid
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationSchedule {
    pub principal: f64,
    pub monthly_payment: f64,
    years: Vec<AmortizationYear>,
}

impl AmortizationSchedule {
    pub fn term_years(&self) -> u32 {
        self.years.len().saturating_sub(1) as u32
    }

    pub fn years(&self) -> &[AmortizationYear] {
        &self.years
    }

    /// Year-end position; years past the term report a settled loan.
    pub fn year(&self, year: u32) -> AmortizationYear {
        self.years
            .get(year as usize)
            .copied()
            .unwrap_or_else(|| AmortizationYear::settled(year))
    }

    pub fn interest_through(&self, year: u32) -> f64 {
        self.years
            .iter()
            .take(year as usize + 1)
            .map(|y| y.interest_paid)
            .sum()
    }
}

pub fn monthly_payment(principal: f64, annual_rate: f64, term_years: u32) -> f64 {
    let periods = term_years * 12;
    if principal <= 0.0 || periods == 0 {
        return 0.0;
    }

    let monthly_rate = annual_rate / 12.0;
    if monthly_rate.abs() < 1e-12 {
        return principal / periods as f64;
    }

    let growth = (1.0 + monthly_rate).powi(periods as i32);
    principal * monthly_rate * growth / (growth - 1.0)
}

/// Month-by-month repayment of a fixed-rate loan, rolled up per year.
/// Index 0 holds the opening balance with no payments.
pub fn amortize(principal: f64, annual_rate: f64, term_years: u32) -> AmortizationSchedule {
    let principal = principal.max(0.0);
    let monthly_rate = annual_rate / 12.0;
    let payment = monthly_payment(principal, annual_rate, term_years);

    let mut years = Vec::with_capacity(term_years as usize + 1);
    years.push(AmortizationYear {
        year: 0,
        balance: principal,
        interest_paid: 0.0,
        principal_paid: 0.0,
    });

    let mut balance = principal;
    for year in 1..=term_years {
        let mut interest_paid = 0.0;
        let mut principal_paid = 0.0;
        for _ in 0..12 {
            if balance <= 0.0 {
                break;
            }
            let interest = balance * monthly_rate;
            let repaid = (payment - interest).min(balance);
            interest_paid += interest;
            principal_paid += repaid;
            balance -= repaid;
        }

        // Rounding residue from the level payment is cleared with the last instalment.
        if year == term_years && balance > 0.0 {
            principal_paid += balance;
            balance = 0.0;
        }

        years.push(AmortizationYear {
            year,
            balance: balance.max(0.0),
            interest_paid,
            principal_paid,
        });
    }

    AmortizationSchedule {
        principal,
        monthly_payment: payment,
        years,
    }
}
