use hovis_core::bucket::TimeMS;

#[test]
fn test_time_arithmetic() {
    let a = TimeMS::from(150u64);
    let b = TimeMS::from(50u64);
    assert_eq!(a + b, TimeMS::from(200u64));
    assert_eq!(a - b, TimeMS::from(100u64));
    assert_eq!(b - a, TimeMS::ZERO);
    assert_eq!(TimeMS::from_secs(60), TimeMS::from(60000u64));
    assert_eq!("250".parse::<TimeMS>(), Ok(TimeMS::from(250u64)));
    assert_eq!(TimeMS::from(1500u64).as_secs_f64(), 1.5);
}
