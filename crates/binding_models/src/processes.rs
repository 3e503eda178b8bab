//! One-dimensional stochastic processes.
//!
//! A process is described by its drift and diffusion; discretisation
//! defaults to a single Euler step. Processes are observables so models
//! built on them can be invalidated when their parameters move.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use binding_core::bridge::{ForeignClass, MethodSpec, Override};
use binding_core::patterns::{Observable, Observed};
use binding_core::types::BindingError;

/// Euler expectation `x0 + drift * dt`.
pub fn euler_expectation(x0: f64, drift: f64, dt: f64) -> f64 {
    x0 + drift * dt
}

/// Euler variance `diffusion^2 * dt`.
pub fn euler_variance(diffusion: f64, dt: f64) -> f64 {
    diffusion * diffusion * dt
}

/// Euler standard deviation `diffusion * sqrt(dt)`.
pub fn euler_std_deviation(diffusion: f64, dt: f64) -> f64 {
    diffusion * dt.sqrt()
}

/// Diffusion `dx = mu(t, x) dt + sigma(t, x) dW`.
///
/// # Required Methods
///
/// - [`x0`](StochasticProcess1D::x0), [`drift`](StochasticProcess1D::drift),
///   [`diffusion`](StochasticProcess1D::diffusion)
///
/// # Provided Methods
///
/// Euler discretisation of `expectation`, `std_deviation`, `variance` and
/// `evolve`. Processes with exact transition moments override them.
pub trait StochasticProcess1D: Observed {
    /// Initial value.
    ///
    /// # Errors
    ///
    /// Implementations backed by foreign code may fail.
    fn x0(&self) -> Result<f64, BindingError>;

    /// Drift at `(t, x)`.
    ///
    /// # Errors
    ///
    /// Implementations backed by foreign code may fail.
    fn drift(&self, t: f64, x: f64) -> Result<f64, BindingError>;

    /// Diffusion at `(t, x)`.
    ///
    /// # Errors
    ///
    /// Implementations backed by foreign code may fail.
    fn diffusion(&self, t: f64, x: f64) -> Result<f64, BindingError>;

    /// Expected value at `t0 + dt` given `x0` at `t0`.
    ///
    /// # Errors
    ///
    /// Propagates `drift` failures.
    fn expectation(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        Ok(euler_expectation(x0, self.drift(t0, x0)?, dt))
    }

    /// Standard deviation over `dt` given `x0` at `t0`.
    ///
    /// # Errors
    ///
    /// Propagates `diffusion` failures.
    fn std_deviation(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        Ok(euler_std_deviation(self.diffusion(t0, x0)?, dt))
    }

    /// Variance over `dt` given `x0` at `t0`.
    ///
    /// # Errors
    ///
    /// Propagates `diffusion` failures.
    fn variance(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        Ok(euler_variance(self.diffusion(t0, x0)?, dt))
    }

    /// Value at `t0 + dt` for standard normal draw `dw`.
    ///
    /// # Errors
    ///
    /// Propagates moment failures.
    fn evolve(&self, t0: f64, x0: f64, dt: f64, dw: f64) -> Result<f64, BindingError> {
        Ok(self.expectation(t0, x0, dt)? + self.std_deviation(t0, x0, dt)? * dw)
    }
}

/// Ornstein-Uhlenbeck process `dx = a (r - x) dt + sigma dW`.
///
/// Overrides the Euler defaults with the exact transition moments.
///
/// # Examples
///
/// ```
/// use binding_models::processes::{OrnsteinUhlenbeckProcess, StochasticProcess1D};
///
/// let ou = OrnsteinUhlenbeckProcess::new(0.1, 0.01, 0.03, 0.05).unwrap();
/// let e = ou.expectation(0.0, 0.03, 1.0).unwrap();
/// assert!((e - (0.05 + (0.03 - 0.05) * (-0.1_f64).exp())).abs() < 1e-12);
/// ```
pub struct OrnsteinUhlenbeckProcess {
    observable: Rc<Observable>,
    speed: Cell<f64>,
    volatility: Cell<f64>,
    x0: f64,
    level: f64,
}

impl fmt::Debug for OrnsteinUhlenbeckProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrnsteinUhlenbeckProcess")
            .field("speed", &self.speed.get())
            .field("volatility", &self.volatility.get())
            .field("x0", &self.x0)
            .field("level", &self.level)
            .finish()
    }
}

fn check_parameters(speed: f64, volatility: f64) -> Result<(), BindingError> {
    if speed.is_nan() || speed < 0.0 {
        return Err(BindingError::InvalidValue(format!("negative speed: {speed}")));
    }
    if volatility.is_nan() || volatility < 0.0 {
        return Err(BindingError::InvalidValue(format!(
            "negative volatility: {volatility}"
        )));
    }
    Ok(())
}

impl OrnsteinUhlenbeckProcess {
    /// Process with mean-reversion `speed` towards `level`.
    ///
    /// # Errors
    ///
    /// [`BindingError::InvalidValue`] for negative speed or volatility.
    pub fn new(speed: f64, volatility: f64, x0: f64, level: f64) -> Result<Rc<Self>, BindingError> {
        check_parameters(speed, volatility)?;
        Ok(Rc::new(Self {
            observable: Observable::new(),
            speed: Cell::new(speed),
            volatility: Cell::new(volatility),
            x0,
            level,
        }))
    }

    /// Mean-reversion speed.
    pub fn speed(&self) -> f64 {
        self.speed.get()
    }

    /// Volatility.
    pub fn volatility(&self) -> f64 {
        self.volatility.get()
    }

    /// Long-run level.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Replace the dynamics and notify observers.
    ///
    /// # Errors
    ///
    /// [`BindingError::InvalidValue`] for negative inputs; observer
    /// failures are propagated.
    pub fn set_parameters(&self, speed: f64, volatility: f64) -> Result<(), BindingError> {
        check_parameters(speed, volatility)?;
        self.speed.set(speed);
        self.volatility.set(volatility);
        self.observable.notify_observers()
    }
}

impl Observed for OrnsteinUhlenbeckProcess {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl StochasticProcess1D for OrnsteinUhlenbeckProcess {
    fn x0(&self) -> Result<f64, BindingError> {
        Ok(self.x0)
    }

    fn drift(&self, _t: f64, x: f64) -> Result<f64, BindingError> {
        Ok(self.speed.get() * (self.level - x))
    }

    fn diffusion(&self, _t: f64, _x: f64) -> Result<f64, BindingError> {
        Ok(self.volatility.get())
    }

    fn expectation(&self, _t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        Ok(self.level + (x0 - self.level) * (-self.speed.get() * dt).exp())
    }

    fn std_deviation(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        Ok(self.variance(t0, x0, dt)?.sqrt())
    }

    fn variance(&self, _t0: f64, _x0: f64, dt: f64) -> Result<f64, BindingError> {
        let a = self.speed.get();
        let sigma = self.volatility.get();
        if a < f64::EPSILON.sqrt() {
            // Small-speed limit
            return Ok(sigma * sigma * dt);
        }
        Ok(0.5 * sigma * sigma / a * (1.0 - (-2.0 * a * dt).exp()))
    }
}

type ScalarFn = dyn Fn() -> Result<f64, BindingError>;
type PointFn = dyn Fn(f64, f64) -> Result<f64, BindingError>;
type MomentFn = dyn Fn(f64, f64, f64) -> Result<f64, BindingError>;
type EvolveFn = dyn Fn(f64, f64, f64, f64) -> Result<f64, BindingError>;

/// A one-dimensional process implemented by foreign code.
pub struct ForeignProcess {
    observable: Rc<Observable>,
    x0: Override<ScalarFn>,
    drift: Override<PointFn>,
    diffusion: Override<PointFn>,
    expectation: Override<MomentFn>,
    std_deviation: Override<MomentFn>,
    variance: Override<MomentFn>,
    evolve: Override<EvolveFn>,
}

impl fmt::Debug for ForeignProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignProcess")
            .field("observable", &self.observable.id())
            .field("x0", &self.x0)
            .field("drift", &self.drift)
            .field("diffusion", &self.diffusion)
            .finish_non_exhaustive()
    }
}

impl ForeignProcess {
    /// Start describing a foreign process.
    pub fn builder() -> ForeignProcessBuilder {
        ForeignProcessBuilder {
            x0: Override::new(Self::CLASS, "x0"),
            drift: Override::new(Self::CLASS, "drift"),
            diffusion: Override::new(Self::CLASS, "diffusion"),
            expectation: Override::new(Self::CLASS, "expectation"),
            std_deviation: Override::new(Self::CLASS, "stdDeviation"),
            variance: Override::new(Self::CLASS, "variance"),
            evolve: Override::new(Self::CLASS, "evolve"),
        }
    }
}

impl Observed for ForeignProcess {
    fn observable(&self) -> &Rc<Observable> {
        &self.observable
    }
}

impl StochasticProcess1D for ForeignProcess {
    fn x0(&self) -> Result<f64, BindingError> {
        (self.x0.required()?)()
    }

    fn drift(&self, t: f64, x: f64) -> Result<f64, BindingError> {
        (self.drift.required()?)(t, x)
    }

    fn diffusion(&self, t: f64, x: f64) -> Result<f64, BindingError> {
        (self.diffusion.required()?)(t, x)
    }

    fn expectation(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        match self.expectation.get() {
            Some(f) => f(t0, x0, dt),
            None => Ok(euler_expectation(x0, self.drift(t0, x0)?, dt)),
        }
    }

    fn std_deviation(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        match self.std_deviation.get() {
            Some(f) => f(t0, x0, dt),
            None => Ok(euler_std_deviation(self.diffusion(t0, x0)?, dt)),
        }
    }

    fn variance(&self, t0: f64, x0: f64, dt: f64) -> Result<f64, BindingError> {
        match self.variance.get() {
            Some(f) => f(t0, x0, dt),
            None => Ok(euler_variance(self.diffusion(t0, x0)?, dt)),
        }
    }

    fn evolve(&self, t0: f64, x0: f64, dt: f64, dw: f64) -> Result<f64, BindingError> {
        match self.evolve.get() {
            Some(f) => f(t0, x0, dt, dw),
            None => Ok(self.expectation(t0, x0, dt)? + self.std_deviation(t0, x0, dt)? * dw),
        }
    }
}

impl ForeignClass for ForeignProcess {
    const CLASS: &'static str = "StochasticProcess1D";
    const METHODS: &'static [MethodSpec] = &[
        MethodSpec::required("x0"),
        MethodSpec::required("drift"),
        MethodSpec::required("diffusion"),
        MethodSpec::defaulted("expectation"),
        MethodSpec::defaulted("stdDeviation"),
        MethodSpec::defaulted("variance"),
        MethodSpec::defaulted("evolve"),
    ];

    fn is_overridden(&self, method: &str) -> bool {
        match method {
            "x0" => self.x0.is_overridden(),
            "drift" => self.drift.is_overridden(),
            "diffusion" => self.diffusion.is_overridden(),
            "expectation" => self.expectation.is_overridden(),
            "stdDeviation" => self.std_deviation.is_overridden(),
            "variance" => self.variance.is_overridden(),
            "evolve" => self.evolve.is_overridden(),
            _ => false,
        }
    }
}

/// Builder for [`ForeignProcess`].
pub struct ForeignProcessBuilder {
    x0: Override<ScalarFn>,
    drift: Override<PointFn>,
    diffusion: Override<PointFn>,
    expectation: Override<MomentFn>,
    std_deviation: Override<MomentFn>,
    variance: Override<MomentFn>,
    evolve: Override<EvolveFn>,
}

impl ForeignProcessBuilder {
    /// Override `x0`.
    pub fn x0(mut self, f: impl Fn() -> Result<f64, BindingError> + 'static) -> Self {
        self.x0.set(Box::new(f));
        self
    }

    /// Override `drift`.
    pub fn drift(mut self, f: impl Fn(f64, f64) -> Result<f64, BindingError> + 'static) -> Self {
        self.drift.set(Box::new(f));
        self
    }

    /// Override `diffusion`.
    pub fn diffusion(
        mut self,
        f: impl Fn(f64, f64) -> Result<f64, BindingError> + 'static,
    ) -> Self {
        self.diffusion.set(Box::new(f));
        self
    }

    /// Override `expectation`.
    pub fn expectation(
        mut self,
        f: impl Fn(f64, f64, f64) -> Result<f64, BindingError> + 'static,
    ) -> Self {
        self.expectation.set(Box::new(f));
        self
    }

    /// Override `stdDeviation`.
    pub fn std_deviation(
        mut self,
        f: impl Fn(f64, f64, f64) -> Result<f64, BindingError> + 'static,
    ) -> Self {
        self.std_deviation.set(Box::new(f));
        self
    }

    /// Override `variance`.
    pub fn variance(
        mut self,
        f: impl Fn(f64, f64, f64) -> Result<f64, BindingError> + 'static,
    ) -> Self {
        self.variance.set(Box::new(f));
        self
    }

    /// Override `evolve`.
    pub fn evolve(
        mut self,
        f: impl Fn(f64, f64, f64, f64) -> Result<f64, BindingError> + 'static,
    ) -> Self {
        self.evolve.set(Box::new(f));
        self
    }

    /// Finish construction.
    pub fn build(self) -> Rc<ForeignProcess> {
        Rc::new(ForeignProcess {
            observable: Observable::new(),
            x0: self.x0,
            drift: self.drift,
            diffusion: self.diffusion,
            expectation: self.expectation,
            std_deviation: self.std_deviation,
            variance: self.variance,
            evolve: self.evolve,
        })
    }
}
