#[cfg(test)]
mod tests {
    use crate::{
        Breakpoints, ContractStatus, Controller, DeployOptions, HaltReason, ProtocolConfig,
        StepOutcome,
    };
    use signum_core::Transaction;
    use signum_types::MINUS_ONE;

    const FEE: u64 = 735_000;

    fn deploy(options: DeployOptions) -> (Controller, u64) {
        let mut controller = Controller::default();
        let id = controller.deploy(options).unwrap();
        (controller, id)
    }

    fn run(controller: &mut Controller, id: u64) -> StepOutcome {
        controller
            .run_contract(id, &Breakpoints::new())
            .unwrap()
            .outcome
    }

    fn cell(controller: &Controller, id: u64, name: &str) -> u64 {
        controller.contract(id).unwrap().memory.read(name)
    }

    #[test]
    fn test_arithmetic_wraps_around() {
        let source = "^declare a\n^declare b\n^declare c\n\
                      SET @a #ffffffffffffffff\n\
                      SET @b #0000000000000002\n\
                      ADD @a $b\n\
                      DEC @c\n\
                      SET @b #ffffffffffffffff\n\
                      MUL @b $b\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Finished)
        );
        assert_eq!(cell(&controller, id, "a"), 1);
        assert_eq!(cell(&controller, id, "c"), u64::MAX);
        assert_eq!(cell(&controller, id, "b"), 1);
    }

    #[test]
    fn test_division_by_zero_kills_without_handler() {
        let source = "^declare a\n^declare z\nSET @a #0000000000000007\nDIV @a $z\nFIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        assert!(matches!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Dead(_))
        ));
        let contract = controller.contract(id).unwrap();
        assert!(contract.dead);
        assert!(!contract.exception.as_deref().unwrap_or_default().is_empty());
        assert_eq!(contract.ip, 3);
        assert_eq!(contract.status(), ContractStatus::Dead);
    }

    #[test]
    fn test_division_by_zero_redirects_to_handler() {
        let source = "^declare a\n^declare z\n\
                      ERR :handler\n\
                      SET @a #0000000000000007\n\
                      MOD @a $z\n\
                      FIN\n\
                      handler:\n\
                      SET @a #0000000000000063\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Finished)
        );
        let contract = controller.contract(id).unwrap();
        assert!(!contract.dead);
        assert_eq!(contract.memory.read("a"), 0x63);
    }

    #[test]
    fn test_unknown_label_is_fatal_even_with_handler() {
        let source = "ERR :handler\nJMP :nowhere\nhandler:\nFIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        let contract = controller.contract(id).unwrap();
        assert!(contract.dead);
        assert_eq!(contract.ip, 1);
        assert!(contract.exception.as_deref().unwrap_or_default().contains("nowhere"));
    }

    #[test]
    fn test_unparseable_line_and_end_of_code_are_fatal() {
        let (mut controller, id) = deploy(DeployOptions::new("^declare a\nINC @a\nSET @a\nFIN"));
        run(&mut controller, id);
        let contract = controller.contract(id).unwrap();
        assert!(contract.dead);
        assert_eq!(contract.ip, 2);
        assert_eq!(contract.memory.read("a"), 1);

        let (mut controller, id) = deploy(DeployOptions::new("^declare a\nINC @a\n"));
        run(&mut controller, id);
        assert!(controller.contract(id).unwrap().dead);
    }

    #[test]
    fn test_out_of_balance_freezes_without_partial_debit() {
        let source = "^declare x\nINC @x\nINC @x\nINC @x\nFIN";
        let options = DeployOptions::new(source).with_initial_balance(2 * FEE);
        let (mut controller, id) = deploy(options);
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::OutOfBalance)
        );
        let contract = controller.contract(id).unwrap();
        assert!(contract.frozen);
        assert!(!contract.running);
        assert_eq!(contract.ip, 3);
        assert_eq!(contract.memory.read("x"), 2);
        assert_eq!(contract.status(), ContractStatus::FrozenStopped);
        assert_eq!(controller.blockchain().balance(id), 0);
    }

    #[test]
    fn test_finish_then_unqualified_transaction_does_not_reactivate() {
        let (mut controller, id) = deploy(DeployOptions::new("^declare x\nSET @x #0000000000000001\nFIN"));
        run(&mut controller, id);
        let contract = controller.contract(id).unwrap();
        assert!(contract.finished && contract.frozen);
        assert_eq!(contract.memory.read("x"), 1);

        let height = controller.blockchain().current_block();
        let tx = Transaction::new(42, id, 0, vec![], vec![], height);
        let report = controller.forge_block(&[tx]).unwrap();
        assert_eq!(report.applied.len(), 1);
        assert!(report.activated.is_empty());
        assert!(!controller.contract(id).unwrap().running);
    }

    #[test]
    fn test_sends_to_same_recipient_coalesce() {
        let source = "^declare r\n^declare amt\n\
                      SET @r #00000000000003e8\n\
                      SET @amt #0000000000000064\n\
                      FUN set_B1 $r\n\
                      FUN send_to_Address_in_B $amt\n\
                      FUN send_to_Address_in_B $amt\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        assert_eq!(controller.contract(id).unwrap().enqueued.len(), 1);

        let report = controller.forge_block(&[]).unwrap();
        assert_eq!(report.dispatched.len(), 1);
        let tx = controller
            .blockchain()
            .find_transaction(report.dispatched[0])
            .unwrap();
        assert_eq!((tx.sender, tx.recipient, tx.amount), (id, 1000, 200));
        assert_eq!(controller.blockchain().balance(1000), 200);
        assert!(controller.contract(id).unwrap().enqueued.is_empty());
    }

    #[test]
    fn test_breakpoint_on_third_executable_line() {
        let source = "^declare a\nstart:\nSET @a #0000000000000001\n\nINC @a\nnext:\nINC @a\nFIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        let breakpoints = Breakpoints::from([6]);
        let result = controller.run_contract(id, &breakpoints).unwrap();
        assert_eq!(result.outcome, StepOutcome::Breakpoint(6));
        assert_eq!(result.steps, 2);
        let contract = controller.contract(id).unwrap();
        assert!(contract.running && !contract.stopped && !contract.dead);
        assert_eq!(contract.memory.read("a"), 2);

        let result = controller.run_contract(id, &breakpoints).unwrap();
        assert_eq!(result.outcome, StepOutcome::Halted(HaltReason::Finished));
        assert_eq!(cell(&controller, id, "a"), 3);
    }

    #[test]
    fn test_subroutines_and_code_stack() {
        let source = "^declare n\n\
                      JSR :twice\n\
                      JSR :twice\n\
                      FIN\n\
                      twice:\n\
                      INC @n\n\
                      INC @n\n\
                      RET";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Finished)
        );
        assert_eq!(cell(&controller, id, "n"), 4);
        assert!(controller.contract(id).unwrap().code_stack.is_empty());

        let (mut controller, id) = deploy(DeployOptions::new("RET\nFIN"));
        run(&mut controller, id);
        assert!(controller.contract(id).unwrap().dead);
    }

    #[test]
    fn test_user_stack_overflow_is_fatal() {
        let source = "^declare x\nloop:\nPSH $x\nJMP :loop";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        let contract = controller.contract(id).unwrap();
        assert!(contract.dead);
        assert_eq!(contract.user_stack.len(), 16);
        assert!(contract
            .exception
            .as_deref()
            .unwrap_or_default()
            .contains("overflow"));
    }

    #[test]
    fn test_indirect_addressing_bounds() {
        let source = "^declare p\n^declare v\n\
                      SET @v #0000000000000009\n\
                      SET @p #0000000000000005\n\
                      SET @($p) $v\n\
                      SET @v $($p)\n\
                      SET @p #0000000000000040\n\
                      SET @v $($p)\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        let contract = controller.contract(id).unwrap();
        assert_eq!(contract.memory.len(), 6);
        assert!(contract.dead);
        assert_eq!(contract.ip, 7);
    }

    #[test]
    fn test_signed_branches() {
        let source = "^declare a\n^declare b\n^declare r\n\
                      SET @a #ffffffffffffffff\n\
                      SET @b #0000000000000001\n\
                      BLT $a $b :less\n\
                      FIN\n\
                      less:\n\
                      SET @r #0000000000000001\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        assert_eq!(cell(&controller, id, "r"), 1);
    }

    #[test]
    fn test_mdv_uses_wide_intermediate() {
        let source = "^declare a\n^declare b\n^declare c\n\
                      SET @a #4000000000000000\n\
                      SET @b #0000000000000004\n\
                      SET @c #0000000000000008\n\
                      MDV @a $b $c\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        assert_eq!(cell(&controller, id, "a"), 0x2000_0000_0000_0000);
    }

    #[test]
    fn test_sleep_and_wake() {
        let source = "^declare n\n^declare blocks\n\
                      SET @blocks #0000000000000003\n\
                      SLP $blocks\n\
                      INC @n\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Sleeping { until_block: 4 })
        );
        controller.forge_block(&[]).unwrap();
        controller.forge_block(&[]).unwrap();
        assert_eq!(
            controller.contract(id).unwrap().status(),
            ContractStatus::Sleeping { until_block: 4 }
        );
        let report = controller.forge_block(&[]).unwrap();
        assert_eq!(report.activated, vec![id]);
        run(&mut controller, id);
        assert_eq!(cell(&controller, id, "n"), 1);
    }

    #[test]
    fn test_stop_resumes_on_activating_transaction() {
        let source = "^declare count\nINC @count\nSTP\nINC @count\nFIN";
        let options = DeployOptions::new(source).with_activation_amount(100);
        let (mut controller, id) = deploy(options);
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Stopped)
        );
        assert_eq!(controller.contract(id).unwrap().ip, 3);

        let small = Transaction::new(7, id, 50, vec![], vec![], 1);
        assert!(controller.forge_block(&[small]).unwrap().activated.is_empty());

        let enough = Transaction::new(7, id, 100, vec![], vec![], 2);
        let report = controller.forge_block(&[enough]).unwrap();
        assert_eq!(report.activated, vec![id]);
        let tx = controller
            .blockchain()
            .find_transaction(report.applied[0])
            .unwrap();
        assert!(tx.processed);

        run(&mut controller, id);
        assert_eq!(cell(&controller, id, "count"), 2);
    }

    #[test]
    fn test_finish_resumes_at_pcs_marker() {
        let source = "^declare n\nSET @n #0000000000000005\nPCS\nINC @n\nFIN";
        let options = DeployOptions::new(source).with_activation_amount(0);
        let (mut controller, id) = deploy(options);
        run(&mut controller, id);
        assert_eq!(controller.contract(id).unwrap().ip, 3);
        controller.forge_block(&[]).unwrap();
        let report = controller.forge_block(&[]).unwrap();
        assert_eq!(report.executed.len(), 1);
        assert_eq!(cell(&controller, id, "n"), 7);
    }

    #[test]
    fn test_ticket_retries_same_instruction_after_sleep() {
        let source = "^declare zero\n^declare ticket\n\
                      FUN A_to_Tx_after_Timestamp $zero\n\
                      FUN @ticket get_Ticket_Id_for_Tx_in_A\n\
                      FIN";
        let options = DeployOptions::new(source).with_activation_amount(0);
        let (mut controller, id) = deploy(options);
        controller
            .blockchain_mut()
            .apply_transaction(Transaction::new(3, id, 10, vec![], vec![], 1))
            .unwrap();

        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Sleeping { until_block: 16 })
        );
        assert_eq!(controller.contract(id).unwrap().ip, 3);

        for _ in 0..15 {
            controller.forge_block(&[]).unwrap();
        }
        assert!(controller.contract(id).unwrap().running);
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Finished)
        );
        let ticket = cell(&controller, id, "ticket");
        assert_ne!(ticket, 0);
        assert_ne!(ticket, MINUS_ONE);
    }

    #[test]
    fn test_fees_are_charged_per_class() {
        let source = "^declare x\n\nlabel:\nINC @x\nFUN clear_A\nFIN";
        let options = DeployOptions::new(source).with_initial_balance(100 * FEE);
        let (mut controller, id) = deploy(options);
        let result = controller.run_contract(id, &Breakpoints::new()).unwrap();
        assert_eq!(result.steps, 3);
        assert_eq!(result.fees, 12 * FEE);
        assert_eq!(controller.blockchain().balance(id), 88 * FEE);
    }

    #[test]
    fn test_deploy_skips_taken_ids() {
        let mut controller = Controller::new(ProtocolConfig::default(), Default::default());
        controller.blockchain_mut().credit(999, 1).unwrap();
        let first = controller.deploy(DeployOptions::new("FIN")).unwrap();
        let second = controller.deploy(DeployOptions::new("FIN")).unwrap();
        assert_eq!((first, second), (1000, 1001));
        assert_eq!(
            controller.blockchain().contract_record(first).unwrap().activation_amount,
            ProtocolConfig::default().default_activation_amount
        );
    }

    #[test]
    fn test_step_reports_breakpoints() {
        let (mut controller, id) = deploy(DeployOptions::new("^declare a\nINC @a\nINC @a\nFIN"));
        let breakpoints = Breakpoints::from([2]);
        assert_eq!(
            controller.step_contract(id, &breakpoints).unwrap(),
            StepOutcome::Breakpoint(2)
        );
        assert_eq!(
            controller.step_contract(id, &breakpoints).unwrap(),
            StepOutcome::Continue
        );
        assert!(controller.step_contract(999_999, &breakpoints).is_err());
    }

    #[test]
    fn test_named_cells_stay_inside_indexed_address_space() {
        let mut source: String = (0..32).map(|i| format!("^declare v{i}\n")).collect();
        source.push_str(
            "SET @extra #0000000000000007\n\
             SET @p #0000000000000020\n\
             SET @y $($p)\n\
             FIN",
        );
        let (mut controller, id) = deploy(DeployOptions::new(source));
        assert_eq!(
            run(&mut controller, id),
            StepOutcome::Halted(HaltReason::Finished)
        );
        let contract = controller.contract(id).unwrap();
        assert!(contract.memory.len() <= contract.memory.limit());
        assert_eq!(contract.memory.read_at(32), Ok(7));
        assert_eq!(cell(&controller, id, "y"), 7);
    }

    #[test]
    fn test_overflowing_dispatch_keeps_queues_and_ledger() {
        let source = "^declare r\n^declare amt\n\
                      SET @r #00000000000003e8\n\
                      SET @amt #0000000000000064\n\
                      FUN set_B1 $r\n\
                      FUN send_to_Address_in_B $amt\n\
                      FIN";
        let (mut controller, id) = deploy(DeployOptions::new(source));
        run(&mut controller, id);
        controller
            .blockchain_mut()
            .credit(1000, u64::MAX - 50)
            .unwrap();
        let transactions = controller.blockchain().transactions().len();
        let height = controller.blockchain().current_block();

        let external = Transaction::new(7, 5, 1, vec![], vec![], height);
        assert!(controller.dispatch_enqueued().is_err());
        assert!(controller.forge_block(&[external]).is_err());

        assert_eq!(controller.contract(id).unwrap().enqueued.len(), 1);
        assert_eq!(controller.blockchain().balance(1000), u64::MAX - 50);
        assert_eq!(controller.blockchain().balance(5), 0);
        assert_eq!(controller.blockchain().transactions().len(), transactions);
        assert_eq!(controller.blockchain().current_block(), height);
    }

    #[test]
    fn test_failed_forge_restores_contract_state() {
        let (mut controller, id) = deploy(DeployOptions::new("^declare a\nINC @a\nFIN"));
        let balance = controller.blockchain().balance(id);
        let height = controller.blockchain().current_block();
        let ip = controller.contract(id).unwrap().ip;
        let overflowing = [
            Transaction::new(7, 5, u64::MAX, vec![], vec![], height),
            Transaction::new(7, 5, 1, vec![], vec![], height),
        ];
        assert!(controller.forge_block(&overflowing).is_err());

        let contract = controller.contract(id).unwrap();
        assert!(contract.running);
        assert_eq!(contract.ip, ip);
        assert_eq!(cell(&controller, id, "a"), 0);
        assert_eq!(controller.blockchain().balance(id), balance);
        assert_eq!(controller.blockchain().balance(5), 0);
        assert_eq!(controller.blockchain().current_block(), height);

        let report = controller.forge_block(&overflowing[1..]).unwrap();
        assert_eq!(report.height, height);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(cell(&controller, id, "a"), 1);
        assert_eq!(controller.blockchain().current_block(), height + 1);
    }
}
