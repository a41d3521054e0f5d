use tr_evaluator::sim::SimEvaluator;
use tr_session::{EventSink, EventSinkConfig, SessionEvent, SessionOrchestrator};
use tr_suggest::LocalSuggestService;
use tr_types::config::OptimizationConfig;
use tr_types::filters::{Comparator, MetricFilter};
use tr_types::params::{ParamMap, ParameterSpec, ParameterValue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("TuneRig sandbox run");

    // A simulated target holding the parameters the search is allowed to tune
    let target = SimEvaluator::with_defaults();
    let mut seed = ParamMap::new();
    seed.insert("fast_period".into(), ParameterValue::Int(10));
    seed.insert("risk_per_trade".into(), ParameterValue::Float(1.0));
    target.seed_parameters(seed);

    // What to tune, what to optimize, when a trial counts
    let config = OptimizationConfig::new("netProfit")
        .with_parameter(ParameterSpec::int("fast_period", 2, 50))
        .with_parameter(ParameterSpec::float("risk_per_trade", 0.5, 2.0))
        .with_filter(MetricFilter::new("maxDrawdown", Comparator::Lt, 25.0))
        .with_trial_budget(5);

    // In-process suggestion service and an event channel to watch progress
    let (tx, rx) = crossbeam_channel::unbounded();
    let orchestrator = SessionOrchestrator::new(
        LocalSuggestService::with_defaults(),
        target,
        EventSink::new(EventSinkConfig::default(), tx),
    );

    let report = orchestrator.run(config).await?;

    println!("\nevents:");
    for event in rx.try_iter() {
        match event {
            SessionEvent::Status { state, message } => match message {
                Some(m) => println!("  status: {state} ({m})"),
                None => println!("  status: {state}"),
            },
            SessionEvent::Trial {
                record,
                completed,
                total,
            } => println!(
                "  trial {completed}/{total}: valid={} best={}",
                record.is_valid, record.is_best_so_far
            ),
            SessionEvent::Best { record } => {
                println!("  best result announced: trial {}", record.trial_number)
            }
        }
    }

    println!("\nrun {} finished: {}", report.run_id, report.final_state);
    println!("trials completed: {}", report.trials_completed);
    if let Some(best) = report.best {
        println!("best trial: #{}", best.trial_number);
        if let Some(profit) = best.metrics.get("netProfit").copied().flatten() {
            println!("best netProfit: {profit:.2}");
        }
        println!("best parameters: {:?}", best.parameters);
    }

    Ok(())
}
