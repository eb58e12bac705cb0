// Copyright 2025 Pavel Roskin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Names of the standard terminfo capabilities
//!
//! The position of an entry in its table is the ordinal used by the compiled
//! terminfo format, so the tables must follow the legacy ncurses order exactly.

/// Long name and short alias (capname) of a capability
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityName {
    pub name: &'static str,
    pub alias: &'static str,
}

const fn cap(name: &'static str, alias: &'static str) -> CapabilityName {
    CapabilityName { name, alias }
}

/// Find the long name for a short alias
///
/// Booleans are searched first, then numbers, then strings.
pub fn long_name(alias: &str) -> Option<&'static str> {
    all_names()
        .find(|entry| entry.alias == alias)
        .map(|entry| entry.name)
}

/// Find the short alias for a long name
pub fn alias(name: &str) -> Option<&'static str> {
    all_names()
        .find(|entry| entry.name == name)
        .map(|entry| entry.alias)
}

fn all_names() -> impl Iterator<Item = &'static CapabilityName> {
    BOOLEANS.iter().chain(NUMBERS.iter()).chain(STRINGS.iter())
}

/// Boolean capabilities in binary order
pub static BOOLEANS: [CapabilityName; 44] = [
    cap("auto_left_margin", "bw"),
    cap("auto_right_margin", "am"),
    cap("no_esc_ctlc", "xsb"),
    cap("ceol_standout_glitch", "xhp"),
    cap("eat_newline_glitch", "xenl"),
    cap("erase_overstrike", "eo"),
    cap("generic_type", "gn"),
    cap("hard_copy", "hc"),
    cap("has_meta_key", "km"),
    cap("has_status_line", "hs"),
    cap("insert_null_glitch", "in"),
    cap("memory_above", "da"),
    cap("memory_below", "db"),
    cap("move_insert_mode", "mir"),
    cap("move_standout_mode", "msgr"),
    cap("over_strike", "os"),
    cap("status_line_esc_ok", "eslok"),
    cap("dest_tabs_magic_smso", "xt"),
    cap("tilde_glitch", "hz"),
    cap("transparent_underline", "ul"),
    cap("xon_xoff", "xon"),
    cap("needs_xon_xoff", "nxon"),
    cap("prtr_silent", "mc5i"),
    cap("hard_cursor", "chts"),
    cap("non_rev_rmcup", "nrrmc"),
    cap("no_pad_char", "npc"),
    cap("non_dest_scroll_region", "ndscr"),
    cap("can_change", "ccc"),
    cap("back_color_erase", "bce"),
    cap("hue_lightness_saturation", "hls"),
    cap("col_addr_glitch", "xhpa"),
    cap("cr_cancels_micro_mode", "crxm"),
    cap("has_print_wheel", "daisy"),
    cap("row_addr_glitch", "xvpa"),
    cap("semi_auto_right_margin", "sam"),
    cap("cpi_changes_res", "cpix"),
    cap("lpi_changes_res", "lpix"),
    cap("backspaces_with_bs", "OTbs"),
    cap("crt_no_scrolling", "OTns"),
    cap("no_correctly_working_cr", "OTnc"),
    cap("gnu_has_meta_key", "OTMT"),
    cap("linefeed_is_newline", "OTNL"),
    cap("has_hardware_tabs", "OTpt"),
    cap("return_does_clr_eol", "OTxr"),
];

/// Numeric capabilities in binary order
pub static NUMBERS: [CapabilityName; 39] = [
    cap("columns", "cols"),
    cap("init_tabs", "it"),
    cap("lines", "lines"),
    cap("lines_of_memory", "lm"),
    cap("magic_cookie_glitch", "xmc"),
    cap("padding_baud_rate", "pb"),
    cap("virtual_terminal", "vt"),
    cap("width_status_line", "wsl"),
    cap("num_labels", "nlab"),
    cap("label_height", "lh"),
    cap("label_width", "lw"),
    cap("max_attributes", "ma"),
    cap("maximum_windows", "wnum"),
    cap("max_colors", "colors"),
    cap("max_pairs", "pairs"),
    cap("no_color_video", "ncv"),
    cap("buffer_capacity", "bufsz"),
    cap("dot_vert_spacing", "spinv"),
    cap("dot_horz_spacing", "spinh"),
    cap("max_micro_address", "maddr"),
    cap("max_micro_jump", "mjump"),
    cap("micro_col_size", "mcs"),
    cap("micro_line_size", "mls"),
    cap("number_of_pins", "npins"),
    cap("output_res_char", "orc"),
    cap("output_res_line", "orl"),
    cap("output_res_horz_inch", "orhi"),
    cap("output_res_vert_inch", "orvi"),
    cap("print_rate", "cps"),
    cap("wide_char_size", "widcs"),
    cap("buttons", "btns"),
    cap("bit_image_entwining", "bitwin"),
    cap("bit_image_type", "bitype"),
    cap("magic_cookie_glitch_ul", "OTug"),
    cap("carriage_return_delay", "OTdC"),
    cap("new_line_delay", "OTdN"),
    cap("backspace_delay", "OTdB"),
    cap("horizontal_tab_delay", "OTdT"),
    cap("number_of_function_keys", "OTkn"),
];

/// String capabilities in binary order
pub static STRINGS: [CapabilityName; 414] = [
    cap("back_tab", "cbt"),
    cap("bell", "bel"),
    cap("carriage_return", "cr"),
    cap("change_scroll_region", "csr"),
    cap("clear_all_tabs", "tbc"),
    cap("clear_screen", "clear"),
    cap("clr_eol", "el"),
    cap("clr_eos", "ed"),
    cap("column_address", "hpa"),
    cap("command_character", "cmdch"),
    cap("cursor_address", "cup"),
    cap("cursor_down", "cud1"),
    cap("cursor_home", "home"),
    cap("cursor_invisible", "civis"),
    cap("cursor_left", "cub1"),
    cap("cursor_mem_address", "mrcup"),
    cap("cursor_normal", "cnorm"),
    cap("cursor_right", "cuf1"),
    cap("cursor_to_ll", "ll"),
    cap("cursor_up", "cuu1"),
    cap("cursor_visible", "cvvis"),
    cap("delete_character", "dch1"),
    cap("delete_line", "dl1"),
    cap("dis_status_line", "dsl"),
    cap("down_half_line", "hd"),
    cap("enter_alt_charset_mode", "smacs"),
    cap("enter_blink_mode", "blink"),
    cap("enter_bold_mode", "bold"),
    cap("enter_ca_mode", "smcup"),
    cap("enter_delete_mode", "smdc"),
    cap("enter_dim_mode", "dim"),
    cap("enter_insert_mode", "smir"),
    cap("enter_secure_mode", "invis"),
    cap("enter_protected_mode", "prot"),
    cap("enter_reverse_mode", "rev"),
    cap("enter_standout_mode", "smso"),
    cap("enter_underline_mode", "smul"),
    cap("erase_chars", "ech"),
    cap("exit_alt_charset_mode", "rmacs"),
    cap("exit_attribute_mode", "sgr0"),
    cap("exit_ca_mode", "rmcup"),
    cap("exit_delete_mode", "rmdc"),
    cap("exit_insert_mode", "rmir"),
    cap("exit_standout_mode", "rmso"),
    cap("exit_underline_mode", "rmul"),
    cap("flash_screen", "flash"),
    cap("form_feed", "ff"),
    cap("from_status_line", "fsl"),
    cap("init_1string", "is1"),
    cap("init_2string", "is2"),
    cap("init_3string", "is3"),
    cap("init_file", "if"),
    cap("insert_character", "ich1"),
    cap("insert_line", "il1"),
    cap("insert_padding", "ip"),
    cap("key_backspace", "kbs"),
    cap("key_catab", "ktbc"),
    cap("key_clear", "kclr"),
    cap("key_ctab", "kctab"),
    cap("key_dc", "kdch1"),
    cap("key_dl", "kdl1"),
    cap("key_down", "kcud1"),
    cap("key_eic", "krmir"),
    cap("key_eol", "kel"),
    cap("key_eos", "ked"),
    cap("key_f0", "kf0"),
    cap("key_f1", "kf1"),
    cap("key_f10", "kf10"),
    cap("key_f2", "kf2"),
    cap("key_f3", "kf3"),
    cap("key_f4", "kf4"),
    cap("key_f5", "kf5"),
    cap("key_f6", "kf6"),
    cap("key_f7", "kf7"),
    cap("key_f8", "kf8"),
    cap("key_f9", "kf9"),
    cap("key_home", "khome"),
    cap("key_ic", "kich1"),
    cap("key_il", "kil1"),
    cap("key_left", "kcub1"),
    cap("key_ll", "kll"),
    cap("key_npage", "knp"),
    cap("key_ppage", "kpp"),
    cap("key_right", "kcuf1"),
    cap("key_sf", "kind"),
    cap("key_sr", "kri"),
    cap("key_stab", "khts"),
    cap("key_up", "kcuu1"),
    cap("keypad_local", "rmkx"),
    cap("keypad_xmit", "smkx"),
    cap("lab_f0", "lf0"),
    cap("lab_f1", "lf1"),
    cap("lab_f10", "lf10"),
    cap("lab_f2", "lf2"),
    cap("lab_f3", "lf3"),
    cap("lab_f4", "lf4"),
    cap("lab_f5", "lf5"),
    cap("lab_f6", "lf6"),
    cap("lab_f7", "lf7"),
    cap("lab_f8", "lf8"),
    cap("lab_f9", "lf9"),
    cap("meta_off", "rmm"),
    cap("meta_on", "smm"),
    cap("newline", "nel"),
    cap("pad_char", "pad"),
    cap("parm_dch", "dch"),
    cap("parm_delete_line", "dl"),
    cap("parm_down_cursor", "cud"),
    cap("parm_ich", "ich"),
    cap("parm_index", "indn"),
    cap("parm_insert_line", "il"),
    cap("parm_left_cursor", "cub"),
    cap("parm_right_cursor", "cuf"),
    cap("parm_rindex", "rin"),
    cap("parm_up_cursor", "cuu"),
    cap("pkey_key", "pfkey"),
    cap("pkey_local", "pfloc"),
    cap("pkey_xmit", "pfx"),
    cap("print_screen", "mc0"),
    cap("prtr_off", "mc4"),
    cap("prtr_on", "mc5"),
    cap("repeat_char", "rep"),
    cap("reset_1string", "rs1"),
    cap("reset_2string", "rs2"),
    cap("reset_3string", "rs3"),
    cap("reset_file", "rf"),
    cap("restore_cursor", "rc"),
    cap("row_address", "vpa"),
    cap("save_cursor", "sc"),
    cap("scroll_forward", "ind"),
    cap("scroll_reverse", "ri"),
    cap("set_attributes", "sgr"),
    cap("set_tab", "hts"),
    cap("set_window", "wind"),
    cap("tab", "ht"),
    cap("to_status_line", "tsl"),
    cap("underline_char", "uc"),
    cap("up_half_line", "hu"),
    cap("init_prog", "iprog"),
    cap("key_a1", "ka1"),
    cap("key_a3", "ka3"),
    cap("key_b2", "kb2"),
    cap("key_c1", "kc1"),
    cap("key_c3", "kc3"),
    cap("prtr_non", "mc5p"),
    cap("char_padding", "rmp"),
    cap("acs_chars", "acsc"),
    cap("plab_norm", "pln"),
    cap("key_btab", "kcbt"),
    cap("enter_xon_mode", "smxon"),
    cap("exit_xon_mode", "rmxon"),
    cap("enter_am_mode", "smam"),
    cap("exit_am_mode", "rmam"),
    cap("xon_character", "xonc"),
    cap("xoff_character", "xoffc"),
    cap("ena_acs", "enacs"),
    cap("label_on", "smln"),
    cap("label_off", "rmln"),
    cap("key_beg", "kbeg"),
    cap("key_cancel", "kcan"),
    cap("key_close", "kclo"),
    cap("key_command", "kcmd"),
    cap("key_copy", "kcpy"),
    cap("key_create", "kcrt"),
    cap("key_end", "kend"),
    cap("key_enter", "kent"),
    cap("key_exit", "kext"),
    cap("key_find", "kfnd"),
    cap("key_help", "khlp"),
    cap("key_mark", "kmrk"),
    cap("key_message", "kmsg"),
    cap("key_move", "kmov"),
    cap("key_next", "knxt"),
    cap("key_open", "kopn"),
    cap("key_options", "kopt"),
    cap("key_previous", "kprv"),
    cap("key_print", "kprt"),
    cap("key_redo", "krdo"),
    cap("key_reference", "kref"),
    cap("key_refresh", "krfr"),
    cap("key_replace", "krpl"),
    cap("key_restart", "krst"),
    cap("key_resume", "kres"),
    cap("key_save", "ksav"),
    cap("key_suspend", "kspd"),
    cap("key_undo", "kund"),
    cap("key_sbeg", "kBEG"),
    cap("key_scancel", "kCAN"),
    cap("key_scommand", "kCMD"),
    cap("key_scopy", "kCPY"),
    cap("key_screate", "kCRT"),
    cap("key_sdc", "kDC"),
    cap("key_sdl", "kDL"),
    cap("key_select", "kslt"),
    cap("key_send", "kEND"),
    cap("key_seol", "kEOL"),
    cap("key_sexit", "kEXT"),
    cap("key_sfind", "kFND"),
    cap("key_shelp", "kHLP"),
    cap("key_shome", "kHOM"),
    cap("key_sic", "kIC"),
    cap("key_sleft", "kLFT"),
    cap("key_smessage", "kMSG"),
    cap("key_smove", "kMOV"),
    cap("key_snext", "kNXT"),
    cap("key_soptions", "kOPT"),
    cap("key_sprevious", "kPRV"),
    cap("key_sprint", "kPRT"),
    cap("key_sredo", "kRDO"),
    cap("key_sreplace", "kRPL"),
    cap("key_sright", "kRIT"),
    cap("key_srsume", "kRES"),
    cap("key_ssave", "kSAV"),
    cap("key_ssuspend", "kSPD"),
    cap("key_sundo", "kUND"),
    cap("req_for_input", "rfi"),
    cap("key_f11", "kf11"),
    cap("key_f12", "kf12"),
    cap("key_f13", "kf13"),
    cap("key_f14", "kf14"),
    cap("key_f15", "kf15"),
    cap("key_f16", "kf16"),
    cap("key_f17", "kf17"),
    cap("key_f18", "kf18"),
    cap("key_f19", "kf19"),
    cap("key_f20", "kf20"),
    cap("key_f21", "kf21"),
    cap("key_f22", "kf22"),
    cap("key_f23", "kf23"),
    cap("key_f24", "kf24"),
    cap("key_f25", "kf25"),
    cap("key_f26", "kf26"),
    cap("key_f27", "kf27"),
    cap("key_f28", "kf28"),
    cap("key_f29", "kf29"),
    cap("key_f30", "kf30"),
    cap("key_f31", "kf31"),
    cap("key_f32", "kf32"),
    cap("key_f33", "kf33"),
    cap("key_f34", "kf34"),
    cap("key_f35", "kf35"),
    cap("key_f36", "kf36"),
    cap("key_f37", "kf37"),
    cap("key_f38", "kf38"),
    cap("key_f39", "kf39"),
    cap("key_f40", "kf40"),
    cap("key_f41", "kf41"),
    cap("key_f42", "kf42"),
    cap("key_f43", "kf43"),
    cap("key_f44", "kf44"),
    cap("key_f45", "kf45"),
    cap("key_f46", "kf46"),
    cap("key_f47", "kf47"),
    cap("key_f48", "kf48"),
    cap("key_f49", "kf49"),
    cap("key_f50", "kf50"),
    cap("key_f51", "kf51"),
    cap("key_f52", "kf52"),
    cap("key_f53", "kf53"),
    cap("key_f54", "kf54"),
    cap("key_f55", "kf55"),
    cap("key_f56", "kf56"),
    cap("key_f57", "kf57"),
    cap("key_f58", "kf58"),
    cap("key_f59", "kf59"),
    cap("key_f60", "kf60"),
    cap("key_f61", "kf61"),
    cap("key_f62", "kf62"),
    cap("key_f63", "kf63"),
    cap("clr_bol", "el1"),
    cap("clear_margins", "mgc"),
    cap("set_left_margin", "smgl"),
    cap("set_right_margin", "smgr"),
    cap("label_format", "fln"),
    cap("set_clock", "sclk"),
    cap("display_clock", "dclk"),
    cap("remove_clock", "rmclk"),
    cap("create_window", "cwin"),
    cap("goto_window", "wingo"),
    cap("hangup", "hup"),
    cap("dial_phone", "dial"),
    cap("quick_dial", "qdial"),
    cap("tone", "tone"),
    cap("pulse", "pulse"),
    cap("flash_hook", "hook"),
    cap("fixed_pause", "pause"),
    cap("wait_tone", "wait"),
    cap("user0", "u0"),
    cap("user1", "u1"),
    cap("user2", "u2"),
    cap("user3", "u3"),
    cap("user4", "u4"),
    cap("user5", "u5"),
    cap("user6", "u6"),
    cap("user7", "u7"),
    cap("user8", "u8"),
    cap("user9", "u9"),
    cap("orig_pair", "op"),
    cap("orig_colors", "oc"),
    cap("initialize_color", "initc"),
    cap("initialize_pair", "initp"),
    cap("set_color_pair", "scp"),
    cap("set_foreground", "setf"),
    cap("set_background", "setb"),
    cap("change_char_pitch", "cpi"),
    cap("change_line_pitch", "lpi"),
    cap("change_res_horz", "chr"),
    cap("change_res_vert", "cvr"),
    cap("define_char", "defc"),
    cap("enter_doublewide_mode", "swidm"),
    cap("enter_draft_quality", "sdrfq"),
    cap("enter_italics_mode", "sitm"),
    cap("enter_leftward_mode", "slm"),
    cap("enter_micro_mode", "smicm"),
    cap("enter_near_letter_quality", "snlq"),
    cap("enter_normal_quality", "snrmq"),
    cap("enter_shadow_mode", "sshm"),
    cap("enter_subscript_mode", "ssubm"),
    cap("enter_superscript_mode", "ssupm"),
    cap("enter_upward_mode", "sum"),
    cap("exit_doublewide_mode", "rwidm"),
    cap("exit_italics_mode", "ritm"),
    cap("exit_leftward_mode", "rlm"),
    cap("exit_micro_mode", "rmicm"),
    cap("exit_shadow_mode", "rshm"),
    cap("exit_subscript_mode", "rsubm"),
    cap("exit_superscript_mode", "rsupm"),
    cap("exit_upward_mode", "rum"),
    cap("micro_column_address", "mhpa"),
    cap("micro_down", "mcud1"),
    cap("micro_left", "mcub1"),
    cap("micro_right", "mcuf1"),
    cap("micro_row_address", "mvpa"),
    cap("micro_up", "mcuu1"),
    cap("order_of_pins", "porder"),
    cap("parm_down_micro", "mcud"),
    cap("parm_left_micro", "mcub"),
    cap("parm_right_micro", "mcuf"),
    cap("parm_up_micro", "mcuu"),
    cap("select_char_set", "scs"),
    cap("set_bottom_margin", "smgb"),
    cap("set_bottom_margin_parm", "smgbp"),
    cap("set_left_margin_parm", "smglp"),
    cap("set_right_margin_parm", "smgrp"),
    cap("set_top_margin", "smgt"),
    cap("set_top_margin_parm", "smgtp"),
    cap("start_bit_image", "sbim"),
    cap("start_char_set_def", "scsd"),
    cap("stop_bit_image", "rbim"),
    cap("stop_char_set_def", "rcsd"),
    cap("subscript_characters", "subcs"),
    cap("superscript_characters", "supcs"),
    cap("these_cause_cr", "docr"),
    cap("zero_motion", "zerom"),
    cap("char_set_names", "csnm"),
    cap("key_mouse", "kmous"),
    cap("mouse_info", "minfo"),
    cap("req_mouse_pos", "reqmp"),
    cap("get_mouse", "getm"),
    cap("set_a_foreground", "setaf"),
    cap("set_a_background", "setab"),
    cap("pkey_plab", "pfxl"),
    cap("device_type", "devt"),
    cap("code_set_init", "csin"),
    cap("set0_des_seq", "s0ds"),
    cap("set1_des_seq", "s1ds"),
    cap("set2_des_seq", "s2ds"),
    cap("set3_des_seq", "s3ds"),
    cap("set_lr_margin", "smglr"),
    cap("set_tb_margin", "smgtb"),
    cap("bit_image_repeat", "birep"),
    cap("bit_image_newline", "binel"),
    cap("bit_image_carriage_return", "bicr"),
    cap("color_names", "colornm"),
    cap("define_bit_image_region", "defbi"),
    cap("end_bit_image_region", "endbi"),
    cap("set_color_band", "setcolor"),
    cap("set_page_length", "slines"),
    cap("display_pc_char", "dispc"),
    cap("enter_pc_charset_mode", "smpch"),
    cap("exit_pc_charset_mode", "rmpch"),
    cap("enter_scancode_mode", "smsc"),
    cap("exit_scancode_mode", "rmsc"),
    cap("pc_term_options", "pctrm"),
    cap("scancode_escape", "scesc"),
    cap("alt_scancode_esc", "scesa"),
    cap("enter_horizontal_hl_mode", "ehhlm"),
    cap("enter_left_hl_mode", "elhlm"),
    cap("enter_low_hl_mode", "elohlm"),
    cap("enter_right_hl_mode", "erhlm"),
    cap("enter_top_hl_mode", "ethlm"),
    cap("enter_vertical_hl_mode", "evhlm"),
    cap("set_a_attributes", "sgr1"),
    cap("set_pglen_inch", "slength"),
    cap("termcap_init2", "OTi2"),
    cap("termcap_reset", "OTrs"),
    cap("linefeed_if_not_lf", "OTnl"),
    cap("backspace_if_not_bs", "OTbc"),
    cap("other_non_function_keys", "OTko"),
    cap("arrow_key_map", "OTma"),
    cap("acs_ulcorner", "OTG2"),
    cap("acs_llcorner", "OTG3"),
    cap("acs_urcorner", "OTG1"),
    cap("acs_lrcorner", "OTG4"),
    cap("acs_ltee", "OTGR"),
    cap("acs_rtee", "OTGL"),
    cap("acs_btee", "OTGU"),
    cap("acs_ttee", "OTGD"),
    cap("acs_hline", "OTGH"),
    cap("acs_vline", "OTGV"),
    cap("acs_plus", "OTGC"),
    cap("memory_lock", "meml"),
    cap("memory_unlock", "memu"),
    cap("box_chars_1", "box1"),
];
