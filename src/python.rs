//! Python bindings, built with the `python` feature.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{AgentDefaults, SimulatorConfig};
use crate::error::SimulatorError;
use crate::simulator::Simulator;
use crate::structs::{Line, Vector2D};

impl From<SimulatorError> for PyErr {
    fn from(err: SimulatorError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pymethods]
impl Vector2D {
    #[new]
    fn py_new(x: f64, y: f64) -> Self {
        Vector2D::new(x, y)
    }

    #[pyo3(name = "magnitude")]
    fn py_magnitude(&self) -> f64 {
        self.magnitude()
    }

    #[pyo3(name = "normalize")]
    fn py_normalize(&self) -> Vector2D {
        self.normalize()
    }

    fn __str__(&self) -> String {
        self.to_string()
    }

    fn __repr__(&self) -> String {
        format!("Vector2D(x={}, y={})", self.x, self.y)
    }
}

#[pymethods]
impl Line {
    #[new]
    fn py_new(point: Vector2D, direction: Vector2D) -> Self {
        Line::new(point, direction)
    }

    fn __str__(&self) -> String {
        self.to_string()
    }
}

#[pyclass(name = "Simulator")]
pub struct PySimulator {
    inner: Simulator,
}

#[pymethods]
impl PySimulator {
    #[new]
    #[pyo3(signature = (time_step = 0.25, max_leaf_size = 10, parallel = false))]
    fn new(time_step: f64, max_leaf_size: usize, parallel: bool) -> PyResult<Self> {
        let inner = Simulator::with_config(SimulatorConfig {
            time_step,
            max_leaf_size,
            parallel,
        })?;
        Ok(PySimulator { inner })
    }

    #[pyo3(signature = (neighbor_dist, max_neighbors, time_horizon, time_horizon_obst, radius, max_speed, velocity = None))]
    #[allow(clippy::too_many_arguments)]
    fn set_agent_defaults(
        &mut self,
        neighbor_dist: f64,
        max_neighbors: usize,
        time_horizon: f64,
        time_horizon_obst: f64,
        radius: f64,
        max_speed: f64,
        velocity: Option<Vector2D>,
    ) -> PyResult<()> {
        let defaults = AgentDefaults::new(
            neighbor_dist,
            max_neighbors,
            time_horizon,
            time_horizon_obst,
            radius,
            max_speed,
        )
        .with_velocity(velocity.unwrap_or_default());
        Ok(self.inner.set_agent_defaults(defaults)?)
    }

    fn add_agent(&mut self, position: Vector2D) -> PyResult<usize> {
        Ok(self.inner.add_agent(position)?)
    }

    /// Registers a polygon; returns the first vertex id, or `None` when the
    /// polygon has fewer than two vertices.
    fn add_obstacle(&mut self, vertices: Vec<Vector2D>) -> Option<usize> {
        self.inner.add_obstacle(&vertices)
    }

    fn process_obstacles(&mut self) {
        self.inner.process_obstacles();
    }

    fn query_visibility(&self, q1: Vector2D, q2: Vector2D, radius: f64) -> bool {
        self.inner.query_visibility(q1, q2, radius)
    }

    fn run(&mut self) {
        self.inner.run();
    }

    fn steer_toward_goals(&mut self) {
        self.inner.steer_toward_goals();
    }

    fn reached_goal(&self) -> bool {
        self.inner.reached_goal()
    }

    fn set_goals(&mut self, goals: Vec<Vector2D>) -> PyResult<()> {
        Ok(self.inner.set_goals(goals)?)
    }

    fn set_agent_goal(&mut self, index: usize, goal: Vector2D) -> PyResult<()> {
        Ok(self.inner.set_agent_goal(index, goal)?)
    }

    fn set_agent_pref_velocity(&mut self, index: usize, pref_velocity: Vector2D) -> PyResult<()> {
        Ok(self.inner.set_agent_pref_velocity(index, pref_velocity)?)
    }

    fn set_agent_position(&mut self, index: usize, position: Vector2D) -> PyResult<()> {
        Ok(self.inner.set_agent_position(index, position)?)
    }

    fn set_agent_velocity(&mut self, index: usize, velocity: Vector2D) -> PyResult<()> {
        Ok(self.inner.set_agent_velocity(index, velocity)?)
    }

    fn set_time_step(&mut self, time_step: f64) -> PyResult<()> {
        Ok(self.inner.set_time_step(time_step)?)
    }

    #[getter]
    fn time_step(&self) -> f64 {
        self.inner.time_step()
    }

    #[getter]
    fn global_time(&self) -> f64 {
        self.inner.global_time()
    }

    #[getter]
    fn num_agents(&self) -> usize {
        self.inner.num_agents()
    }

    fn agent_position(&self, index: usize) -> PyResult<Vector2D> {
        self.inner.agent_position(index).ok_or_else(|| self.out_of_range(index))
    }

    fn agent_velocity(&self, index: usize) -> PyResult<Vector2D> {
        self.inner.agent_velocity(index).ok_or_else(|| self.out_of_range(index))
    }

    fn agent_pref_velocity(&self, index: usize) -> PyResult<Vector2D> {
        self.inner
            .agent_pref_velocity(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    fn agent_radius(&self, index: usize) -> PyResult<f64> {
        self.inner.agent_radius(index).ok_or_else(|| self.out_of_range(index))
    }

    fn agent_goal(&self, index: usize) -> PyResult<Vector2D> {
        self.inner.agent_goal(index).ok_or_else(|| self.out_of_range(index))
    }

    fn agent_orca_lines(&self, index: usize) -> PyResult<Vec<Line>> {
        self.inner
            .agent_orca_lines(index)
            .map(<[Line]>::to_vec)
            .ok_or_else(|| self.out_of_range(index))
    }

    fn __repr__(&self) -> String {
        format!(
            "Simulator(agents={}, obstacle_vertices={}, global_time={})",
            self.inner.num_agents(),
            self.inner.num_obstacle_vertices(),
            self.inner.global_time()
        )
    }
}

impl PySimulator {
    fn out_of_range(&self, index: usize) -> PyErr {
        SimulatorError::AgentOutOfRange {
            index,
            count: self.inner.num_agents(),
        }
        .into()
    }
}

#[pymodule]
fn rvo_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Vector2D>()?;
    m.add_class::<Line>()?;
    m.add_class::<PySimulator>()?;
    Ok(())
}
