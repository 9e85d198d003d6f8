use std::sync::Arc;

use cubecl_grid::config::dispatch::DispatchLogLevel;
use cubecl_grid::config::{GlobalConfig, Logger};
use cubecl_grid::id::TaskId;
use cubecl_grid::memory_management::{DeviceAllocator, ScopedBuffers, WORD_SIZE};
use cubecl_grid::stream::{ComputeStream, GroupContext, Kernel, LaunchGrid};
use cubecl_grid::{ArchVersion, ArchitectureQuery, KernelError};

use crate::aggregate::AggregationStage;
use crate::error::{DispatchError, DispatchStage};
use crate::grid::{GridQueue, TileSchedule, WorkPlan};
use crate::init::{InitializationStage, OutputReset};
use crate::instructions::CombineOp;
use crate::policy::{ExecutionPolicy, GridMapping, PolicyRequest, select_policy};
use crate::status::{StatusTable, StatusWord};
use crate::tile::{Destination, ScratchLayout, TileDescriptor, TileProcessor};

/// Options of the dispatches issued by a [Dispatcher].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Synchronize after every launch, so that device failures are attributed to the stage
    /// that caused them.
    pub synchronous: bool,
    /// Force how tiles are assigned to groups, instead of the mapping of the catalog.
    pub mapping: Option<GridMapping>,
    /// Select policies for this generation instead of probing the device.
    pub architecture: Option<ArchVersion>,
    /// Copy the status table to the [report](DispatchReport) before it is released.
    pub capture_status: bool,
}

impl DispatchOptions {
    /// The options set by the global configuration.
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            synchronous: config.dispatch.synchronous,
            mapping: None,
            architecture: config.dispatch.architecture.map(ArchVersion),
            capture_status: false,
        }
    }
}

/// How a dispatch was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    /// There was no item, nothing was launched.
    Empty,
    /// Tiles accumulated directly into the outputs.
    SinglePass,
    /// Tiles accumulated into private slots, then an aggregation launch reduced them.
    TwoPass,
}

/// The decisions taken by a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// The policy used.
    pub policy: ExecutionPolicy,
    /// The number of items.
    pub num_items: u64,
    /// The number of tiles.
    pub num_tiles: u64,
    /// The number of groups of the tile launch.
    pub num_groups: u32,
    /// The number of groups the device can hold at once, `0` when it wasn't queried.
    pub occupancy: u32,
    /// How the dispatch was executed.
    pub path: ExecutionPath,
    /// The launches issued, in stream order.
    pub tasks: Vec<(DispatchStage, TaskId)>,
    /// The status table after the tile launch, when requested and allocated.
    pub status: Option<Vec<StatusWord>>,
}

impl DispatchReport {
    fn empty(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            num_items: 0,
            num_tiles: 0,
            num_groups: 0,
            occupancy: 0,
            path: ExecutionPath::Empty,
            tasks: Vec::new(),
            status: None,
        }
    }

    /// The stages launched, in stream order.
    pub fn stages(&self) -> Vec<DispatchStage> {
        self.tasks.iter().map(|(stage, _)| *stage).collect()
    }
}

impl core::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[Dispatch] {:?} | {} | {} items, {} tiles, {} groups (occupancy {}), {} launches",
            self.path,
            self.policy,
            self.num_items,
            self.num_tiles,
            self.num_groups,
            self.occupancy,
            self.tasks.len()
        )
    }
}

/// Executes device-wide dispatches on a stream.
///
/// The dispatcher owns every transient allocation of a dispatch: the status table, the drain
/// counter and the scratch buffer are released before a dispatch returns, whether it
/// succeeds or not.
pub struct Dispatcher<'a> {
    arch: &'a dyn ArchitectureQuery,
    allocator: &'a dyn DeviceAllocator,
    stream: &'a mut dyn ComputeStream,
    options: DispatchOptions,
    logger: Logger,
}

impl core::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stream", &self.stream.id())
            .field("allocator", &self.allocator)
            .field("options", &self.options)
            .finish()
    }
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher configured by the [global configuration](GlobalConfig).
    pub fn new(
        arch: &'a dyn ArchitectureQuery,
        allocator: &'a dyn DeviceAllocator,
        stream: &'a mut dyn ComputeStream,
    ) -> Self {
        Self::from_config(arch, allocator, stream, GlobalConfig::get())
    }

    /// Create a dispatcher configured by `config`.
    pub fn from_config(
        arch: &'a dyn ArchitectureQuery,
        allocator: &'a dyn DeviceAllocator,
        stream: &'a mut dyn ComputeStream,
        config: Arc<GlobalConfig>,
    ) -> Self {
        Self {
            arch,
            allocator,
            stream,
            options: DispatchOptions::from_config(&config),
            logger: Logger::from_config(config),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Allocate the transient memory of dispatches from `allocator`.
    pub fn with_allocator(mut self, allocator: &'a dyn DeviceAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// The options.
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// The options, to change them between dispatches.
    pub fn options_mut(&mut self) -> &mut DispatchOptions {
        &mut self.options
    }

    /// The policy for `request` on the device, or on the generation forced by the options.
    pub fn resolve_policy(&self, request: &PolicyRequest) -> Result<ExecutionPolicy, DispatchError> {
        let generation = match self.options.architecture {
            Some(generation) => generation,
            None => self.arch.generation()?,
        };
        let policy = select_policy(generation, request);

        Ok(match self.options.mapping {
            Some(mapping) => policy.with_mapping(mapping),
            None => policy,
        })
    }

    /// Size the tile launch of `num_items` items with `policy`.
    pub fn plan(&self, policy: &ExecutionPolicy, num_items: u64) -> Result<WorkPlan, DispatchError> {
        let hardware = self.arch.hardware();

        if policy.group_size == 0 || policy.group_size > hardware.max_units_per_group {
            return Err(DispatchError::unsupported(format!(
                "Groups of {} units can't be launched, the device allows at most {} units per group",
                policy.group_size, hardware.max_units_per_group
            )));
        }

        let occupancy = self.arch.concurrency_capacity(policy.group_size)?;

        WorkPlan::new(num_items, policy, occupancy, hardware.max_group_count)
    }

    /// Dispatch `num_items` items with the policy selected for `request`.
    ///
    /// The processor is created by `make` once the policy is known.
    pub fn dispatch<P, F>(
        &mut self,
        request: &PolicyRequest,
        num_items: u64,
        make: F,
    ) -> Result<DispatchReport, DispatchError>
    where
        P: TileProcessor,
        F: FnOnce(&ExecutionPolicy) -> P,
    {
        let policy = self.resolve_policy(request)?;
        self.dispatch_with_policy(policy, num_items, make)
    }

    /// Dispatch `num_items` items with a policy selected by the caller, for instance at
    /// compile time with a [PolicyTier](crate::PolicyTier).
    pub fn dispatch_with_policy<P, F>(
        &mut self,
        policy: ExecutionPolicy,
        num_items: u64,
        make: F,
    ) -> Result<DispatchReport, DispatchError>
    where
        P: TileProcessor,
        F: FnOnce(&ExecutionPolicy) -> P,
    {
        if num_items == 0 {
            let report = DispatchReport::empty(policy);
            self.log_report(&report);
            return Ok(report);
        }

        let plan = self.plan(&policy, num_items)?;
        let processor = make(&policy);
        let path = match processor.outputs().is_empty()
            || plan.num_groups == 1
            || policy.variant.is_global_atomic()
        {
            true => ExecutionPath::SinglePass,
            false => ExecutionPath::TwoPass,
        };

        let mut buffers = ScopedBuffers::default();
        let mut tasks = Vec::new();
        let result = self.execute(&policy, &plan, &processor, path, &mut buffers, &mut tasks);

        if result.is_err() && !tasks.is_empty() {
            // Launched tasks may still use the buffers about to be released.
            if let Err(err) = self.stream.sync() {
                log::debug!("Ignoring a failure of an aborted dispatch: {err}");
            }
        }

        let released = buffers.release_all();
        let status = result?;
        released?;

        let report = DispatchReport {
            policy,
            num_items,
            num_tiles: plan.num_tiles,
            num_groups: plan.num_groups,
            occupancy: plan.occupancy,
            path,
            tasks,
            status,
        };
        self.log_report(&report);

        Ok(report)
    }

    fn execute<P: TileProcessor>(
        &mut self,
        policy: &ExecutionPolicy,
        plan: &WorkPlan,
        processor: &P,
        path: ExecutionPath,
        buffers: &mut ScopedBuffers<'a>,
        tasks: &mut Vec<(DispatchStage, TaskId)>,
    ) -> Result<Option<Vec<StatusWord>>, DispatchError> {
        let allocator = self.allocator;
        let op = processor.op();

        // Coordination state: the drain counter followed by the status table.
        let lookback = processor.requires_lookback() && plan.num_tiles > 1;
        let (queue, status) = match plan.uses_queue() || lookback {
            true => {
                let padding = usize::max(self.arch.hardware().plane_size as usize, 1);
                let queue_words = plan.uses_queue() as usize;
                let size = queue_words as u64 * WORD_SIZE + StatusTable::size(plan.num_tiles, padding);
                let buffer = buffers.allocate(allocator, size)?;

                let queue = plan
                    .uses_queue()
                    .then(|| GridQueue::new(buffer.clone(), 0));
                let status = StatusTable::new(buffer, queue_words, padding, plan.num_tiles);

                (queue, Some(status))
            }
            false => (None, None),
        };

        let scratch = match path {
            ExecutionPath::TwoPass => {
                let layout = ScratchLayout::new(plan.num_groups, processor.privatized_shape());
                let buffer = buffers.allocate(allocator, layout.size())?;
                Some((buffer, layout))
            }
            _ => None,
        };

        let mut init = InitializationStage::new(plan.num_tiles)
            .with_queue(queue.clone())
            .with_status(status.clone());
        if path == ExecutionPath::SinglePass {
            for (output, len) in processor.outputs().iter().zip(processor.privatized_shape()) {
                init = init.with_reset(OutputReset::new(output.clone(), *len, op.identity()));
            }
        }

        let mut after = Vec::new();
        if !init.is_empty() {
            let grid = self.stage_grid(policy.group_size, init.num_words());
            let task = self.launch(
                DispatchStage::Initialization,
                grid,
                &after,
                &|context: GroupContext<'_>| init.execute(&context),
                tasks,
            )?;
            after = vec![task];
        }

        let schedule = match &queue {
            Some(queue) => TileSchedule::Dynamic {
                queue: queue.clone(),
                num_tiles: plan.num_tiles,
            },
            None => TileSchedule::Static(plan.even_share()),
        };
        let outputs = processor.outputs();
        let tiles = |context: GroupContext<'_>| -> Result<(), KernelError> {
            let destination = match &scratch {
                Some((buffer, layout)) => Destination::Private {
                    scratch: buffer,
                    layout,
                    group_id: context.group_id,
                },
                None => Destination::Direct { outputs },
            };
            let mut local = processor.init_local(&context);

            schedule.for_each_tile(&context, |index| {
                let tile = TileDescriptor {
                    index,
                    items: plan.tile_items(index),
                    status: status.as_ref(),
                    context,
                };
                processor.consume_tile(&tile, &mut local, &destination)
            })?;

            processor.flush(local, &destination)
        };
        let grid = LaunchGrid::new(plan.num_groups, policy.group_size);
        let task = self.launch(DispatchStage::Tiles, grid, &after, &tiles, tasks)?;

        if let Some((buffer, layout)) = &scratch {
            let stage = AggregationStage::new(op, buffer, layout, outputs);
            let grid = self.stage_grid(policy.group_size, stage.num_words());
            self.launch(
                DispatchStage::Aggregation,
                grid,
                &[task],
                &|context: GroupContext<'_>| stage.execute(&context),
                tasks,
            )?;
        }

        // The transient buffers are released by the caller once everything completed.
        if let Err(source) = self.stream.sync() {
            let stage = tasks
                .iter()
                .find(|(_, task)| *task == source.task)
                .map(|(stage, _)| *stage)
                .unwrap_or(DispatchStage::Tiles);
            return Err(DispatchError::SynchronizationFailure { stage, source });
        }

        Ok(match self.options.capture_status {
            true => status.as_ref().map(StatusTable::snapshot),
            false => None,
        })
    }

    fn launch(
        &mut self,
        stage: DispatchStage,
        grid: LaunchGrid,
        after: &[TaskId],
        kernel: Kernel<'_>,
        tasks: &mut Vec<(DispatchStage, TaskId)>,
    ) -> Result<TaskId, DispatchError> {
        let name = match stage {
            DispatchStage::Initialization => "dispatch_init",
            DispatchStage::Tiles => "dispatch_tiles",
            DispatchStage::Aggregation => "dispatch_aggregate",
        };

        let task = self
            .stream
            .launch(name, grid, after, kernel)
            .map_err(|source| DispatchError::LaunchFailure { stage, source })?;
        tasks.push((stage, task));

        if self.logger.is_enabled(DispatchLogLevel::Full) {
            let message = format!(
                "[Dispatch] {stage} launch {task}: {} groups of {} units",
                grid.num_groups, grid.group_size
            );
            self.logger.log_dispatch(DispatchLogLevel::Full, &message);
        }

        if self.options.synchronous {
            self.stream
                .sync()
                .map_err(|source| DispatchError::SynchronizationFailure { stage, source })?;
        }

        Ok(task)
    }

    /// A grid striding over `num_words` words.
    fn stage_grid(&self, group_size: u32, num_words: usize) -> LaunchGrid {
        let max_group_count = u64::max(self.arch.hardware().max_group_count as u64, 1);
        let num_groups = (num_words as u64)
            .div_ceil(group_size as u64)
            .clamp(1, max_group_count);

        LaunchGrid::new(num_groups as u32, group_size)
    }

    fn log_report(&mut self, report: &DispatchReport) {
        log::debug!("{report}");

        if self.logger.is_enabled(DispatchLogLevel::Basic) {
            self.logger.log_dispatch(DispatchLogLevel::Basic, report);
        }
    }
}
