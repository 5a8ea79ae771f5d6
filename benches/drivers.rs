use criterion::{criterion_group, criterion_main, Criterion};
use descent::nalgebra as na;
use descent::{
    optimize, optimize_scalar, LeastSquares, LinearConstraint, OptimizeConfig, Problem,
};
use na::{dmatrix, dvector, Dyn, IsContiguous, OMatrix};

struct Rosenbrock;

impl Problem for Rosenbrock {
    type Field = f64;

    fn dim(&self) -> usize {
        2
    }
}

impl LeastSquares for Rosenbrock {
    fn residual_dim(&self) -> usize {
        2
    }

    fn eval<Sx, Sfx>(&self, x: &na::Vector<f64, Dyn, Sx>, fx: &mut na::Vector<f64, Dyn, Sfx>)
    where
        Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
        Sfx: na::storage::StorageMut<f64, Dyn>,
    {
        fx[0] = 10.0 * (x[1] - x[0] * x[0]);
        fx[1] = 1.0 - x[0];
    }

    fn jacobian<Sx>(&self, x: &na::Vector<f64, Dyn, Sx>, jac: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
    {
        jac[(0, 0)] = -20.0 * x[0];
        jac[(0, 1)] = 10.0;
        jac[(1, 0)] = -1.0;
        jac[(1, 1)] = 0.0;
    }
}

struct Identity;

impl Problem for Identity {
    type Field = f64;

    fn dim(&self) -> usize {
        2
    }
}

impl LeastSquares for Identity {
    fn residual_dim(&self) -> usize {
        2
    }

    fn eval<Sx, Sfx>(&self, x: &na::Vector<f64, Dyn, Sx>, fx: &mut na::Vector<f64, Dyn, Sfx>)
    where
        Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
        Sfx: na::storage::StorageMut<f64, Dyn>,
    {
        fx[0] = x[0];
        fx[1] = x[1];
    }

    fn jacobian<Sx>(&self, _x: &na::Vector<f64, Dyn, Sx>, jac: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
    {
        jac.fill_with_identity();
    }
}

fn rosenbrock(c: &mut Criterion) {
    let f = Rosenbrock;
    let config = OptimizeConfig::default();

    c.bench_function("lsq-exact rosenbrock", |b| {
        b.iter(|| {
            let result =
                optimize(&f, "lsq-exact", dvector![-10.0, -5.0], None, &config, None).unwrap();
            assert!(result.success());
        })
    });

    c.bench_function("dogleg rosenbrock", |b| {
        b.iter(|| {
            let result =
                optimize(&f, "dogleg", dvector![-10.0, -5.0], None, &config, None).unwrap();
            assert!(result.success());
        })
    });

    c.bench_function("subspace-bfgs rosenbrock", |b| {
        b.iter(|| {
            let result =
                optimize(&f, "subspace-bfgs", dvector![-10.0, -5.0], None, &config, None).unwrap();
            assert!(result.success());
        })
    });
}

fn constrained_minimum_norm(c: &mut Criterion) {
    let f = Identity;
    let config = OptimizeConfig::default();

    c.bench_function("lsq-exact constrained minimum norm", |b| {
        b.iter(|| {
            let constraint = LinearConstraint::new(dmatrix![1.0, 1.0], dvector![1.0]);
            let result = optimize(
                &f,
                "lsq-exact",
                dvector![0.0, 0.0],
                Some(&constraint),
                &config,
                None,
            )
            .unwrap();
            assert!(result.success());
        })
    });
}

fn gradient_descent(c: &mut Criterion) {
    let f = Identity;
    let mut config = OptimizeConfig::default();
    config.sgd.set_learning_rate(0.5);

    c.bench_function("sgd sphere", |b| {
        b.iter(|| {
            let result =
                optimize_scalar(&f, "sgd", dvector![4.0, -4.0], None, &config, None).unwrap();
            assert!(result.success());
        })
    });
}

criterion_group!(benches, rosenbrock, constrained_minimum_norm, gradient_descent);
criterion_main!(benches);
