//! Flat parameter-vector view of burn modules.
//!
//! The trust-region solver operates on the policy as a single flat vector:
//! it needs to read all parameters, write a perturbed copy back, and read
//! the gradient in the same layout. Parameters are matched by module
//! traversal order, which is stable for a fixed architecture, so a vector
//! produced by [`flatten_params`] can always be written back with
//! [`write_flat_params`] on a module of the same architecture.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

struct ParamFlattener<B: Backend> {
    values: Vec<f32>,
    _backend: std::marker::PhantomData<B>,
}

impl<B: Backend> ModuleMapper<B> for ParamFlattener<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let total_size: usize = val.dims().iter().product();

        let flattened = val.reshape([total_size]);
        let data = flattened.into_data();
        self.values.extend(data.as_slice::<f32>().unwrap());

        param
    }
}

struct ParamCounter<B: Backend> {
    count: usize,
    _backend: std::marker::PhantomData<B>,
}

impl<B: Backend> ModuleMapper<B> for ParamCounter<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        self.count += param.val().dims().iter().product::<usize>();
        param
    }
}

struct ParamWriter<'a, B: Backend> {
    flat: &'a [f32],
    offset: usize,
    device: B::Device,
}

impl<'a, B: Backend> ModuleMapper<B> for ParamWriter<'a, B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let shape = param.val().dims();
        let total_size: usize = shape.iter().product();

        let chunk = &self.flat[self.offset..self.offset + total_size];
        self.offset += total_size;

        let tensor = Tensor::<B, 1>::from_floats(chunk, &self.device).reshape(shape);

        Param::initialized(param.id.clone(), tensor)
    }
}

struct GradCollector<'a, B: AutodiffBackend> {
    grads: &'a B::Gradients,
    values: Vec<f32>,
}

impl<'a, B: AutodiffBackend> ModuleMapper<B> for GradCollector<'a, B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let total_size: usize = val.dims().iter().product();

        match val.grad(self.grads) {
            Some(grad) => {
                let flattened = grad.reshape([total_size]);
                let data = flattened.into_data();
                self.values.extend(data.as_slice::<f32>().unwrap());
            }
            // Params not touched by the loss still occupy their slots so
            // the layout stays aligned with flatten_params.
            None => self.values.extend(std::iter::repeat(0.0).take(total_size)),
        }

        param
    }
}

/// Read all float parameters into one flat vector, traversal order.
pub fn flatten_params<B: Backend, M: Module<B> + Clone>(module: &M) -> Vec<f32> {
    let mut mapper = ParamFlattener {
        values: Vec::new(),
        _backend: std::marker::PhantomData,
    };
    let _ = module.clone().map(&mut mapper);
    mapper.values
}

/// Total number of float parameters in the module.
pub fn param_count<B: Backend, M: Module<B> + Clone>(module: &M) -> usize {
    let mut mapper = ParamCounter {
        count: 0,
        _backend: std::marker::PhantomData,
    };
    let _ = module.clone().map(&mut mapper);
    mapper.count
}

/// Write a flat vector back into a module of the same architecture.
///
/// `flat` must have exactly as many entries as the module has parameters
/// and use the [`flatten_params`] layout.
pub fn write_flat_params<B: Backend, M: Module<B>>(
    module: M,
    flat: &[f32],
    device: &B::Device,
) -> M {
    let mut mapper = ParamWriter::<B> {
        flat,
        offset: 0,
        device: device.clone(),
    };
    let module = module.map(&mut mapper);
    debug_assert_eq!(mapper.offset, flat.len());
    module
}

/// Collect gradients into a flat vector aligned with [`flatten_params`].
///
/// Parameters without a gradient contribute zeros.
pub fn collect_grads<B: AutodiffBackend, M: Module<B> + Clone>(
    module: &M,
    grads: &B::Gradients,
) -> Vec<f32> {
    let mut mapper = GradCollector::<B> {
        grads,
        values: Vec::new(),
    };
    let _ = module.clone().map(&mut mapper);
    mapper.values
}
