mod common;

mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration as StdDuration;

    use lightfx_conductor::{
        CoreAffinity, Kernel, MAX_TASKS, SchedulerError, SpawnError, TaskBody, TaskDef, TaskId,
        TaskScheduler, TaskState, TaskWrapper,
    };

    use crate::common::{HostKernel, RejectingKernel};

    /// Loop body that naps briefly, observing stop requests promptly.
    struct NapBody;

    impl TaskBody for NapBody {
        fn run(&mut self) {
            thread::sleep(StdDuration::from_millis(5));
        }
    }

    /// Loop body that blocks far longer than the stop budget.
    struct StubbornBody;

    impl TaskBody for StubbornBody {
        fn run(&mut self) {
            thread::sleep(StdDuration::from_millis(3000));
        }
    }

    /// Body journaling its hook invocations.
    struct JournalBody {
        journal: Arc<Mutex<Vec<&'static str>>>,
    }

    impl TaskBody for JournalBody {
        fn setup(&mut self) {
            self.journal.lock().unwrap().push("setup");
        }

        fn run(&mut self) {
            self.journal.lock().unwrap().push("run");
            thread::sleep(StdDuration::from_millis(5));
        }
    }

    fn host_scheduler() -> TaskScheduler {
        let kernel: Arc<dyn Kernel> = Arc::new(HostKernel);
        TaskScheduler::new(kernel)
    }

    /// Wait for a started task to reach its loop.
    fn wait_for_executing(scheduler: &TaskScheduler, id: TaskId) {
        for _ in 0..100 {
            let state = scheduler.task(id).map(TaskWrapper::state);
            if state == Some(TaskState::Executing) {
                thread::sleep(StdDuration::from_millis(20));
                return;
            }
            thread::sleep(StdDuration::from_millis(10));
        }
        panic!("task never reached executing");
    }

    #[test]
    fn test_slot_table_exhaustion() {
        let mut scheduler = host_scheduler();
        let def = TaskDef::default();
        let mut ids = Vec::new();
        for _ in 0..MAX_TASKS {
            ids.push(scheduler.start_task(&def, Box::new(NapBody)).unwrap());
        }
        assert_eq!(scheduler.available_slots(), 0);

        assert_eq!(
            scheduler.start_task(&def, Box::new(NapBody)),
            Err(SchedulerError::SlotsExhausted)
        );
        assert_eq!(scheduler.available_slots(), 0);

        for id in ids {
            assert!(scheduler.stop_task(id));
        }
        assert_eq!(scheduler.available_slots(), MAX_TASKS);
    }

    #[test]
    fn test_rejected_spawn_leaves_the_table_untouched() {
        let kernel: Arc<dyn Kernel> = Arc::new(RejectingKernel);
        let mut scheduler = TaskScheduler::new(kernel);
        assert_eq!(
            scheduler.start_task(&TaskDef::default(), Box::new(NapBody)),
            Err(SchedulerError::Spawn(SpawnError))
        );
        assert_eq!(scheduler.available_slots(), MAX_TASKS);
    }

    #[test]
    fn test_stop_frees_the_slot() {
        let mut scheduler = host_scheduler();
        let id = scheduler
            .start_task(&TaskDef::default(), Box::new(NapBody))
            .unwrap();
        assert_eq!(scheduler.available_slots(), MAX_TASKS - 1);

        assert!(scheduler.stop_task(id));
        assert_eq!(scheduler.available_slots(), MAX_TASKS);
        assert!(scheduler.task(id).is_none());
        // The id is stale now; a second stop reports failure
        assert!(!scheduler.stop_task(id));
    }

    #[test]
    fn test_stop_times_out_on_an_unresponsive_task() {
        let mut scheduler = host_scheduler();
        let id = scheduler
            .start_task(&TaskDef::default(), Box::new(StubbornBody))
            .unwrap();
        wait_for_executing(&scheduler, id);

        assert!(!scheduler.stop_task(id));
        // The task keeps running and its slot stays occupied
        assert!(scheduler.task(id).is_some());
        assert_eq!(scheduler.available_slots(), MAX_TASKS - 1);
    }

    #[test]
    fn test_lookups_by_name_index_and_id() {
        let mut scheduler = host_scheduler();
        let def = TaskDef {
            name: Some("engine"),
            stack_size: 4096,
            priority: 3,
            core: CoreAffinity::Core1,
        };
        let id = scheduler.start_task(&def, Box::new(NapBody)).unwrap();

        let wrapper = scheduler.task_by_name("engine").unwrap();
        assert_eq!(wrapper.uid(), id);
        assert_eq!(wrapper.stack_size(), 4096);
        assert_eq!(wrapper.priority(), 3);
        assert_eq!(wrapper.core(), CoreAffinity::Core1);
        assert_eq!(wrapper.core().mask(), 0x02);

        let index = wrapper.index();
        assert_eq!(scheduler.task_at(index).unwrap().uid(), id);
        assert_eq!(scheduler.task(id).unwrap().name(), "engine");
        assert!(scheduler.task_by_name("ghost").is_none());

        assert!(scheduler.stop_task(id));
    }

    #[test]
    fn test_generated_and_truncated_names() {
        let mut scheduler = host_scheduler();
        let anonymous = scheduler
            .start_task(&TaskDef::default(), Box::new(NapBody))
            .unwrap();
        let expected = format!("task-{}", anonymous.raw());
        assert_eq!(scheduler.task(anonymous).unwrap().name(), expected);

        let long = TaskDef {
            name: Some("storage-gateway-maintenance"),
            ..TaskDef::default()
        };
        let truncated = scheduler.start_task(&long, Box::new(NapBody)).unwrap();
        assert_eq!(
            scheduler.task(truncated).unwrap().name(),
            "storage-gateway-"
        );

        assert!(scheduler.stop_task(anonymous));
        assert!(scheduler.stop_task(truncated));
    }

    #[test]
    fn test_setup_runs_once_before_the_loop() {
        let mut scheduler = host_scheduler();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let id = scheduler
            .start_task(
                &TaskDef::default(),
                Box::new(JournalBody {
                    journal: journal.clone(),
                }),
            )
            .unwrap();
        thread::sleep(StdDuration::from_millis(100));
        assert!(scheduler.stop_task(id));

        let journal = journal.lock().unwrap();
        assert_eq!(journal.first(), Some(&"setup"));
        assert_eq!(journal.iter().filter(|entry| **entry == "setup").count(), 1);
        assert!(journal.iter().any(|entry| *entry == "run"));
    }

    #[test]
    fn test_started_task_reaches_executing() {
        let mut scheduler = host_scheduler();
        let id = scheduler
            .start_task(&TaskDef::default(), Box::new(NapBody))
            .unwrap();
        wait_for_executing(&scheduler, id);
        assert_eq!(scheduler.task(id).unwrap().state(), TaskState::Executing);
        assert!(scheduler.stop_task(id));
    }
}
